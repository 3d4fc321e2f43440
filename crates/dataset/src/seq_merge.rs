//! In-memory merge of timestamp-sorted record arrays.
//!
//! Concatenate-and-sort pays `O(n log n)` even when the inputs barely overlap,
//! which is the common case for a stream and its time-shifted closing twin.
//! [`merge_data`] instead bisects the global time range recursively and copies
//! whole runs whenever only one input has records inside the current window.

use record::Record;

/// Merges sorted record arrays into one array sorted by timestamp.
///
/// Every input must be sorted non-decreasing by timestamp; any of them may be
/// empty. On equal timestamps, records of the same input keep their relative
/// order and inputs are concatenated in argument order (there is no secondary
/// key).
///
/// # Panics
///
/// Panics if the number of records written differs from the sum of the input
/// lengths, which would indicate a bug in the recursion.
#[must_use]
pub fn merge_data(inputs: &[&[Record]]) -> Vec<Record> {
    let inputs: Vec<&[Record]> = inputs.iter().copied().filter(|d| !d.is_empty()).collect();
    let total: usize = inputs.iter().map(|d| d.len()).sum();
    let mut out = Vec::with_capacity(total);

    // Both bounds are widened to i64 so `max_ts + 1` cannot overflow.
    let (Some(t0), Some(t1)) = (
        inputs.iter().map(|d| i64::from(d[0].timestamp)).min(),
        inputs.iter().map(|d| i64::from(d[d.len() - 1].timestamp) + 1).max(),
    ) else {
        return out;
    };

    let lo = vec![0usize; inputs.len()];
    let hi: Vec<usize> = inputs.iter().map(|d| d.len()).collect();
    merge_window(&inputs, t0, t1, &lo, &hi, &mut out);

    assert_eq!(out.len(), total, "merge_data lost or duplicated records");
    out
}

/// Appends every record of `inputs[d][lo[d]..hi[d]]` to `out` in timestamp
/// order. Each of those slices only holds timestamps in `[t0, t1)`.
fn merge_window(
    inputs: &[&[Record]],
    t0: i64,
    t1: i64,
    lo: &[usize],
    hi: &[usize],
    out: &mut Vec<Record>,
) {
    let non_empty = lo.iter().zip(hi).filter(|(a, b)| b > a).count();

    // A single live input (or a single instant) needs no comparisons at all.
    if non_empty <= 1 || t1 - t0 <= 1 {
        for (d, data) in inputs.iter().enumerate() {
            if hi[d] > lo[d] {
                out.extend_from_slice(&data[lo[d]..hi[d]]);
            }
        }
        return;
    }

    let tm = t0 + (t1 - t0) / 2;
    let split: Vec<usize> = inputs
        .iter()
        .enumerate()
        .map(|(d, data)| {
            lo[d] + data[lo[d]..hi[d]].partition_point(|r| i64::from(r.timestamp) < tm)
        })
        .collect();

    merge_window(inputs, t0, tm, lo, &split, out);
    merge_window(inputs, tm, t1, &split, hi, out);
}
