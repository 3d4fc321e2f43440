use super::{at_times, rec};
use crate::{AttrValue, Error, Metadata, Record, Store, StreamArray, STREAM_IDS, TS_RANGE};
use anyhow::Result;
use proptest::prelude::*;
use tempfile::tempdir;

fn sample() -> StreamArray {
    StreamArray::new(vec![
        rec(-3, 7, 100, 1),
        rec(4, -5, -20, 2),
        rec(9, 7, 55, 2),
        rec(4, 1, 0, 8),
    ])
}

#[test]
fn new_sorts_unsorted_input_stably() {
    let ds = StreamArray::new(vec![rec(0, 0, 0, 5), rec(1, 0, 0, 1), rec(2, 0, 0, 5)]);
    let order: Vec<i16> = ds.iter().map(|r| r.stream_id).collect();
    assert_eq!(order, vec![1, 0, 2]);
    assert_eq!(ds.metadata().ts_range(), (1, 5));
    assert_eq!(ds.metadata().length, 3);
}

#[test]
fn hash_ids_remaps_records_and_metadata() {
    let mut ds = sample();
    ds.hash_streams(4).hash_sources(3);
    let sids: Vec<i16> = ds.iter().map(|r| r.stream_id).collect();
    let hids: Vec<i16> = ds.iter().map(|r| r.source_id).collect();
    assert_eq!(sids, vec![1, 0, 1, 0]);
    assert_eq!(hids, vec![1, 1, 1, 1]);
    assert_eq!(ds.metadata(), &Metadata::analyze(ds.records()));
}

#[test]
#[should_panic(expected = "modulus must be positive")]
fn hash_by_zero_panics() {
    sample().hash_streams(0);
}

#[test]
fn negate_and_time_shift() {
    let mut ds = sample();
    ds.negate().time_shift(-10);
    assert!(ds.iter().all(|r| r.update_count == -1));
    assert_eq!(ds.metadata().ts_range(), (-9, -2));
    assert_eq!(ds.tstart(), Some(-9));
    assert_eq!(ds.metadata(), &Metadata::analyze(ds.records()));
}

#[test]
fn merge_puts_own_records_first_on_ties() {
    let mut a = StreamArray::new(at_times(1, &[0, 3, 3]));
    let b = StreamArray::new(at_times(2, &[3, 4]));
    a.merge(&b);
    let tags: Vec<(i32, i16)> = a.iter().map(|r| (r.timestamp, r.stream_id)).collect();
    assert_eq!(tags, vec![(0, 1), (3, 1), (3, 1), (3, 2), (4, 2)]);
    assert_eq!(a.metadata().length, 5);
    assert_eq!(a.metadata().stream_ids.len(), 2);
}

#[test]
fn merge_with_empty_keeps_metadata() {
    let mut a = sample();
    let before = a.metadata().clone();
    a.merge(&StreamArray::new(Vec::new()));
    assert_eq!(a.metadata(), &before);

    let mut empty = StreamArray::new(Vec::new());
    empty.merge(&sample());
    assert_eq!(empty.metadata(), &before);
}

#[test]
fn time_window_emits_closing_twins() {
    let mut ds = StreamArray::new(at_times(0, &[0, 5]));
    ds.time_window(3);
    let got: Vec<(i32, i32)> = ds.iter().map(|r| (r.timestamp, r.update_count)).collect();
    assert_eq!(got, vec![(0, 1), (3, -1), (5, 1), (8, -1)]);
    assert_eq!(ds.metadata(), &Metadata::analyze(ds.records()));
}

/// Net update count of all records with timestamp `<= t`.
fn running_sum(records: &[Record], t: i32) -> i64 {
    records
        .iter()
        .take_while(|r| r.timestamp <= t)
        .map(|r| i64::from(r.update_count))
        .sum()
}

proptest! {
    #[test]
    fn time_window_running_sum_counts_trailing_window(
        ts in prop::collection::vec(0i32..200, 1..60),
        delta in 0i32..40,
    ) {
        let original = at_times(0, &ts);
        let mut ds = StreamArray::new(original.clone());
        ds.time_window(delta);
        prop_assert_eq!(ds.len(), 2 * original.len());
        prop_assert!(record::is_sorted_by_ts(ds.records()));

        let last = original[original.len() - 1].timestamp;
        for t in 0..=(last + delta + 1) {
            let in_window = original
                .iter()
                .filter(|r| r.timestamp > t - delta && r.timestamp <= t)
                .count() as i64;
            prop_assert_eq!(running_sum(ds.records(), t), in_window);
        }
        prop_assert_eq!(running_sum(ds.records(), last + delta), 0);
    }

    #[test]
    fn transform_chains_keep_metadata_exact(
        ts in prop::collection::vec(-100i32..100, 1..40),
        n in 1i16..8,
        shift in -50i32..50,
    ) {
        let mut ds = StreamArray::new(at_times(-7, &ts));
        ds.hash_streams(n).time_shift(shift).hash_sources(n);
        prop_assert_eq!(ds.metadata(), &Metadata::analyze(ds.records()));
    }
}

#[test]
fn slice_narrows_only_the_time_range() {
    let ds = sample();
    let s = ds.slice(1..3);
    assert_eq!(s.len(), 2);
    assert_eq!(s.metadata().length, 2);
    assert_eq!(s.metadata().ts_range(), (2, 2));
    // Key range and id sets still describe the parent.
    assert_eq!(s.metadata().key_range(), ds.metadata().key_range());
    assert_eq!(s.metadata().stream_ids, ds.metadata().stream_ids);
    assert_eq!(s.metadata().source_ids, ds.metadata().source_ids);
    assert_ne!(s.metadata(), &Metadata::analyze(s.records()));
}

#[test]
fn slice_bounds_are_clamped() {
    let ds = sample();
    assert_eq!(ds.slice(2..100).len(), 2);
    assert_eq!(ds.slice(..).records(), ds.records());
    assert_eq!(ds.slice(..=0).len(), 1);

    let empty = ds.slice(10..20);
    assert!(empty.is_empty());
    assert_eq!(empty.metadata().length, 0);
    assert_eq!(empty.metadata().ts_range(), ds.metadata().ts_range());
}

#[test]
fn slice_drops_annotations() {
    let mut ds = sample();
    ds.attrs_mut().insert("origin".into(), AttrValue::from("x"));
    assert!(ds.slice(..).attrs().is_empty());
    assert_eq!(ds.clone().attrs().len(), 1);
}

#[test]
fn time_index_is_lower_bound() {
    let ds = StreamArray::new(at_times(0, &[1, 3, 3, 3, 7]));
    assert_eq!(ds.time_index(0), 0);
    assert_eq!(ds.time_index(1), 0);
    assert_eq!(ds.time_index(2), 1);
    assert_eq!(ds.time_index(3), 1);
    assert_eq!(ds.time_index(4), 4);
    assert_eq!(ds.time_index(8), 5);
}

#[test]
fn time_bounds() {
    let ds = sample();
    assert_eq!(ds.tstart(), Some(1));
    assert_eq!(ds.tend(), Some(9));
    assert_eq!(ds.tlen(), Some(8));

    let empty = StreamArray::new(Vec::new());
    assert_eq!((empty.tstart(), empty.tend(), empty.tlen()), (None, None, None));

    let edge = StreamArray::new(vec![rec(0, 0, 0, i32::MAX)]);
    assert_eq!(edge.tend(), Some(i64::from(i32::MAX) + 1));
}

#[test]
fn clone_is_independent() {
    let ds = sample();
    let mut copy = ds.clone();
    copy.negate().hash_streams(2);
    assert_ne!(copy.records(), ds.records());
    assert_eq!(ds.metadata(), &Metadata::analyze(ds.records()));
}

#[test]
fn store_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let mut ds = sample();
    ds.attrs_mut().insert("origin".into(), AttrValue::from("unit"));
    ds.attrs_mut().insert("scale".into(), AttrValue::Float(0.5));

    let persisted = ds.to_store(&store, "sample", false)?;
    assert_eq!(persisted.metadata(), ds.metadata());
    assert_eq!(
        persisted.attr(TS_RANGE),
        Some(&AttrValue::I32Array(vec![1, 8]))
    );
    assert_eq!(
        persisted.attr(STREAM_IDS),
        Some(&AttrValue::I16Array(vec![-3, 4, 9]))
    );

    let back = StreamArray::from_store(&store, "sample")?;
    assert_eq!(back, ds);
    Ok(())
}

#[test]
fn to_store_keeps_trusted_metadata_of_slices() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let slice = sample().slice(0..1);
    slice.to_store(&store, "s", false)?;
    let back = StreamArray::from_store(&store, "s")?;
    assert_eq!(back.metadata(), slice.metadata());
    Ok(())
}

#[test]
fn to_store_ignores_reserved_user_attrs() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let mut ds = sample();
    ds.attrs_mut()
        .insert(TS_RANGE.into(), AttrValue::I32Array(vec![0, 0]));
    let persisted = ds.to_store(&store, "r", false)?;
    assert_eq!(persisted.ts_range(), (1, 8));
    assert!(StreamArray::from_store(&store, "r")?.attrs().is_empty());
    Ok(())
}

#[test]
fn to_store_refuses_existing_name() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    sample().to_store(&store, "dup", false)?;
    let err = sample().to_store(&store, "dup", false).unwrap_err();
    assert!(matches!(err, Error::NameConflict(ref n) if n == "dup"));

    let mut other = sample();
    other.negate();
    other.to_store(&store, "dup", true)?;
    assert_eq!(StreamArray::from_store(&store, "dup")?.records(), other.records());
    Ok(())
}

#[test]
fn to_store_skips_attributes_that_cannot_be_saved() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    let mut array = sample();
    array.attrs_mut().insert("x".repeat(70_000), AttrValue::Int(1));
    array.attrs_mut().insert("origin".to_string(), AttrValue::from("unit"));

    let persisted = array.to_store(&store, "long-attr", false)?;
    assert_eq!(persisted.metadata(), array.metadata());
    assert_eq!(persisted.attr(TS_RANGE), Some(&AttrValue::I32Array(vec![1, 8])));
    assert_eq!(
        persisted.attr(STREAM_IDS),
        Some(&AttrValue::I16Array(vec![-3, 4, 9]))
    );
    let user: Vec<&str> = persisted.user_attrs().map(|(k, _)| k).collect();
    assert_eq!(user, vec!["origin"]);

    let loaded = StreamArray::from_store(&store, "long-attr")?;
    assert_eq!(loaded.attrs().len(), 1);
    assert_eq!(loaded.attrs().get("origin"), Some(&AttrValue::from("unit")));
    Ok(())
}
