use super::{at_times, reference_merge};
use crate::merge_data;
use proptest::prelude::*;
use record::{is_sorted_by_ts, Record};

#[test]
fn empty_inputs() {
    assert!(merge_data(&[]).is_empty());
    assert!(merge_data(&[&[], &[], &[]]).is_empty());
}

#[test]
fn single_non_empty_input_is_copied() {
    let a = at_times(1, &[1, 1, 4, 9]);
    assert_eq!(merge_data(&[&[], &a, &[]]), a);
}

#[test]
fn interleaves_by_timestamp() {
    let a = at_times(1, &[0, 2, 4, 6]);
    let b = at_times(2, &[1, 3, 5]);
    let ts: Vec<i32> = merge_data(&[&a, &b]).iter().map(|r| r.timestamp).collect();
    assert_eq!(ts, vec![0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn ties_are_concatenated_in_input_order() {
    let a = at_times(1, &[5, 5, 7]);
    let b = at_times(2, &[5, 7]);
    let out = merge_data(&[&a, &b]);
    let tags: Vec<(i32, i16)> = out.iter().map(|r| (r.timestamp, r.stream_id)).collect();
    assert_eq!(tags, vec![(5, 1), (5, 1), (5, 2), (7, 1), (7, 2)]);

    let swapped = merge_data(&[&b, &a]);
    let tags: Vec<(i32, i16)> = swapped.iter().map(|r| (r.timestamp, r.stream_id)).collect();
    assert_eq!(tags, vec![(5, 2), (5, 1), (5, 1), (7, 2), (7, 1)]);
}

#[test]
fn disjoint_ranges_take_the_fast_path() {
    let a = at_times(1, &[0, 1, 2]);
    let b = at_times(2, &[100, 101]);
    let mut expected = a.clone();
    expected.extend_from_slice(&b);
    assert_eq!(merge_data(&[&b, &a]), expected);
}

#[test]
fn extreme_timestamps() {
    let a = vec![Record::new(0, 0, 0, 1, i32::MIN), Record::new(0, 0, 1, 1, i32::MAX)];
    let b = vec![Record::new(1, 0, 0, 1, 0), Record::new(1, 0, 1, 1, i32::MAX)];
    let out = merge_data(&[&a, &b]);
    assert_eq!(out, reference_merge(&[&a, &b]));
    assert_eq!(out.len(), 4);
}

fn sorted_input(tag: i16) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(-30i32..30, 0..50).prop_map(move |ts| at_times(tag, &ts))
}

proptest! {
    #[test]
    fn matches_stable_sort_of_concatenation(
        a in sorted_input(0),
        b in sorted_input(1),
        c in sorted_input(2),
    ) {
        let out = merge_data(&[&a, &b, &c]);
        prop_assert!(is_sorted_by_ts(&out));
        prop_assert_eq!(out.len(), a.len() + b.len() + c.len());
        prop_assert_eq!(out, reference_merge(&[&a, &b, &c]));
    }

    #[test]
    fn one_at_a_time_matches_all_at_once(
        a in sorted_input(0),
        b in sorted_input(1),
        c in sorted_input(2),
    ) {
        let ab = merge_data(&[&a, &b]);
        let stepwise = merge_data(&[&ab, &c]);
        prop_assert_eq!(stepwise, merge_data(&[&a, &b, &c]));
    }

    #[test]
    fn order_of_inputs_only_affects_ties(a in sorted_input(0), b in sorted_input(1)) {
        let mut ab = merge_data(&[&a, &b]);
        let mut ba = merge_data(&[&b, &a]);
        let key = |r: &Record| (r.timestamp, r.stream_id, r.key);
        ab.sort_by_key(key);
        ba.sort_by_key(key);
        prop_assert_eq!(ab, ba);
    }
}
