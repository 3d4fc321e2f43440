use super::{at_times, reference_merge};
use crate::{
    cascade_merge, cascade_merge_with, Error, MergeConfig, Metadata, Record, Store, StreamDataset,
    TS_RANGE,
};
use anyhow::Result;
use tempfile::tempdir;

fn twins(records: &[Record], delta: i32) -> Vec<Record> {
    records.iter().map(|r| r.closing_twin(delta)).collect()
}

#[test]
fn windowed_merge_of_two_inputs() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let a = StreamDataset::create(
        &store,
        "a",
        &[Record::new(0, 1, 0, 1, 0), Record::new(0, 1, 0, 1, 5)],
        false,
    )?;
    let b = StreamDataset::create(&store, "b", &[Record::new(0, 2, 0, 1, 2)], false)?;

    let mut out = cascade_merge(&store, "out", &[&a, &b], Some(3), false)?;
    assert_eq!(out.len(), 6);
    let got: Vec<(i32, i16, i32)> = out
        .read(..)?
        .iter()
        .map(|r| (r.timestamp, r.source_id, r.update_count))
        .collect();
    assert_eq!(
        got,
        vec![
            (0, 1, 1),
            (2, 2, 1),
            (3, 1, -1),
            // Direct inputs go before twins on a tie.
            (5, 1, 1),
            (5, 2, -1),
            (8, 1, -1),
        ]
    );
    assert_eq!(out.ts_range(), (0, 8));
    Ok(())
}

#[test]
fn merging_two_halves_reproduces_the_original() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let records = at_times(3, &[0, 1, 1, 2, 4, 4, 4, 4, 6, 7, 7, 9, 12, 12]);
    // The split falls inside the run of ts=4.
    let first = StreamDataset::create(&store, "first", &records[..6], false)?;
    let second = StreamDataset::create(&store, "second", &records[6..], false)?;

    let config = MergeConfig::default().with_scan_chunk(2).with_write_buffer(3);
    let mut out = cascade_merge_with(&store, "whole", &[&first, &second], None, false, &config)?;
    assert_eq!(out.read(..)?, records);
    assert_eq!(out.metadata(), &Metadata::analyze(&records));
    Ok(())
}

#[test]
fn matches_in_memory_merge_for_any_buffer_sizes() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let a = at_times(0, &[0, 0, 0, 1, 5, 5, 8, 13, 13, 13, 20]);
    let b = at_times(1, &[0, 2, 5, 5, 5, 14]);
    let c = at_times(2, &[13, 13, 13, 13]);
    let delta = 5;
    let (ta, tb, tc) = (twins(&a, delta), twins(&b, delta), twins(&c, delta));
    let expected = reference_merge(&[&a, &b, &c, &ta, &tb, &tc]);

    let da = StreamDataset::create(&store, "a", &a, false)?;
    let db = StreamDataset::create(&store, "b", &b, false)?;
    let dc = StreamDataset::create(&store, "c", &c, false)?;

    for chunk in [1, 2, 3, 7, 1 << 16] {
        for buffer in [1, 4, 1 << 22] {
            let config = MergeConfig::default()
                .with_scan_chunk(chunk)
                .with_write_buffer(buffer)
                .with_progress_interval(5);
            let mut out =
                cascade_merge_with(&store, "out", &[&da, &db, &dc], Some(delta), true, &config)?;
            assert_eq!(out.read(..)?, expected, "chunk={chunk} buffer={buffer}");
        }
    }
    Ok(())
}

#[test]
fn output_is_decorated_from_contents() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let a = StreamDataset::create(&store, "a", &at_times(4, &[10, 20]), false)?;
    let b = StreamDataset::create(&store, "b", &at_times(-2, &[15]), false)?;
    let out = cascade_merge(&store, "out", &[&a, &b], Some(100), false)?;

    assert_eq!(out.ts_range(), (10, 120));
    assert_eq!(out.stream_ids().iter().copied().collect::<Vec<_>>(), vec![-2, 4]);
    let reopened = StreamDataset::open(&store, "out")?;
    assert_eq!(reopened.metadata(), out.metadata());
    assert!(reopened.attr(TS_RANGE).is_some());
    Ok(())
}

#[test]
fn empty_inputs_produce_an_empty_dataset() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let a = StreamDataset::create(&store, "a", &[], false)?;
    let b = StreamDataset::create(&store, "b", &at_times(0, &[1, 2]), false)?;

    let out = cascade_merge(&store, "e", &[&a], Some(4), false)?;
    assert!(out.is_empty());
    assert_eq!(out.metadata(), &Metadata::default());

    let mut out = cascade_merge(&store, "one", &[&a, &b], None, false)?;
    assert_eq!(out.read(..)?, at_times(0, &[1, 2]));

    let out = cascade_merge(&store, "none", &[], Some(1), false)?;
    assert_eq!(out.len(), 0);
    Ok(())
}

#[test]
fn same_input_twice() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let recs = at_times(0, &[1, 2, 3]);
    let a = StreamDataset::create(&store, "a", &recs, false)?;
    let config = MergeConfig::default().with_scan_chunk(1);
    let mut out = cascade_merge_with(&store, "aa", &[&a, &a], None, false, &config)?;
    assert_eq!(out.read(..)?, reference_merge(&[&recs, &recs]));
    Ok(())
}

#[test]
fn refuses_existing_target() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let a = StreamDataset::create(&store, "a", &at_times(0, &[1]), false)?;
    StreamDataset::create(&store, "taken", &[], false)?;
    assert!(matches!(
        cascade_merge(&store, "taken", &[&a], None, false),
        Err(Error::NameConflict(_))
    ));
    cascade_merge(&store, "taken", &[&a], None, true)?;
    Ok(())
}

#[test]
fn refuses_to_overwrite_an_input() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let records = at_times(0, &[1, 2]);
    let mut a = StreamDataset::create(&store, "a", &records, false)?;
    {
        let inputs = [&a];
        assert!(matches!(
            cascade_merge(&store, "a", &inputs, Some(1), true),
            Err(Error::NameConflict(_))
        ));
    }
    assert_eq!(a.read(..)?, records);
    Ok(())
}

#[test]
fn zero_progress_interval_still_finishes() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let records = at_times(2, &[1, 4]);
    let input = StreamDataset::create(&store, "in", &records, false)?;
    let config = MergeConfig {
        progress_interval: 0,
        ..MergeConfig::default()
    };

    let mut out = cascade_merge_with(&store, "out", &[&input], None, false, &config)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out.read(..)?, records);
    Ok(())
}
