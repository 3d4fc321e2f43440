mod array_tests;
mod cascade_tests;
mod merge_data_tests;
mod wcup_tests;

use record::Record;

/// Record with update count 1, tagged by `sid` and ordered by `ts`.
pub(crate) fn rec(sid: i16, hid: i16, key: i32, ts: i32) -> Record {
    Record::new(sid, hid, key, 1, ts)
}

/// Sorted records at the given timestamps, keyed by position.
pub(crate) fn at_times(sid: i16, ts: &[i32]) -> Vec<Record> {
    let mut ts = ts.to_vec();
    ts.sort_unstable();
    ts.into_iter()
        .enumerate()
        .map(|(i, t)| rec(sid, 0, i as i32, t))
        .collect()
}

/// Concatenates the inputs and stable-sorts by timestamp: the reference
/// result for every merge in this crate.
pub(crate) fn reference_merge(inputs: &[&[Record]]) -> Vec<Record> {
    let mut all: Vec<Record> = inputs.iter().flat_map(|d| d.iter().copied()).collect();
    all.sort_by_key(|r| r.timestamp);
    all
}
