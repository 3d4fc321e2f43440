use std::collections::BTreeSet;
use std::fmt;

use crate::Record;

/// Maps an id onto `0..n` (floor modulus, so negative ids land in range too).
///
/// # Panics
///
/// Panics if `n` is not positive.
#[must_use]
pub fn modulo_id(id: i16, n: i16) -> i16 {
    assert!(n > 0, "id modulus must be positive, got {}", n);
    id.rem_euclid(n)
}

/// Summary statistics over a record sequence.
///
/// A `Metadata` is computed once with [`analyze`](Metadata::analyze) and then
/// mutated alongside its owning sequence by every transform, so it always
/// describes that sequence. Id sets are kept in `BTreeSet`s, which makes
/// equality independent of the order ids were seen in.
///
/// An empty sequence has `length == 0`, zeroed ranges and empty id sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pub length: usize,
    pub ts_min: i32,
    pub ts_max: i32,
    pub key_min: i32,
    pub key_max: i32,
    pub stream_ids: BTreeSet<i16>,
    pub source_ids: BTreeSet<i16>,
}

impl Metadata {
    /// Scans `records` once and returns their metadata.
    #[must_use]
    pub fn analyze(records: &[Record]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };

        let mut meta = Self {
            length: records.len(),
            ts_min: first.timestamp,
            ts_max: first.timestamp,
            key_min: first.key,
            key_max: first.key,
            stream_ids: BTreeSet::new(),
            source_ids: BTreeSet::new(),
        };
        for rec in records {
            meta.ts_min = meta.ts_min.min(rec.timestamp);
            meta.ts_max = meta.ts_max.max(rec.timestamp);
            meta.key_min = meta.key_min.min(rec.key);
            meta.key_max = meta.key_max.max(rec.key);
            meta.stream_ids.insert(rec.stream_id);
            meta.source_ids.insert(rec.source_id);
        }
        meta
    }

    /// `(ts_min, ts_max)`.
    #[must_use]
    pub fn ts_range(&self) -> (i32, i32) {
        (self.ts_min, self.ts_max)
    }

    /// `(key_min, key_max)`.
    #[must_use]
    pub fn key_range(&self) -> (i32, i32) {
        (self.key_min, self.key_max)
    }

    /// Replaces the stream id set by `{id mod n}`. Irreversible.
    pub fn hash_streams(&mut self, n: i16) -> &mut Self {
        self.stream_ids = self.stream_ids.iter().map(|&id| modulo_id(id, n)).collect();
        self
    }

    /// Replaces the source id set by `{id mod n}`. Irreversible.
    pub fn hash_sources(&mut self, n: i16) -> &mut Self {
        self.source_ids = self.source_ids.iter().map(|&id| modulo_id(id, n)).collect();
        self
    }

    /// Moves both time bounds by `delta`.
    pub fn time_shift(&mut self, delta: i32) -> &mut Self {
        self.ts_min = self.ts_min.wrapping_add(delta);
        self.ts_max = self.ts_max.wrapping_add(delta);
        self
    }

    /// Widens this metadata to describe the merge of both sequences.
    ///
    /// Lengths add, ranges widen to their union and id sets are united. An
    /// empty side contributes nothing to the ranges.
    pub fn merge(&mut self, other: &Metadata) -> &mut Self {
        if other.length > 0 {
            if self.length == 0 {
                self.ts_min = other.ts_min;
                self.ts_max = other.ts_max;
                self.key_min = other.key_min;
                self.key_max = other.key_max;
            } else {
                self.ts_min = self.ts_min.min(other.ts_min);
                self.ts_max = self.ts_max.max(other.ts_max);
                self.key_min = self.key_min.min(other.key_min);
                self.key_max = self.key_max.max(other.key_max);
            }
        }
        self.length += other.length;
        self.stream_ids.extend(other.stream_ids.iter().copied());
        self.source_ids.extend(other.source_ids.iter().copied());
        self
    }

    /// One-line summary, as printed by the CLI `INFO` command.
    #[must_use]
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "length={} ts_range=[{}, {}] key_range=[{}, {}] stream_ids={:?} source_ids={:?}",
            self.length,
            self.ts_min,
            self.ts_max,
            self.key_min,
            self.key_max,
            self.stream_ids,
            self.source_ids
        )
    }
}
