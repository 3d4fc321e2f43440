//! In-memory datasets.

use record::{is_sorted_by_ts, modulo_id, Metadata, Record};
use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};
use store::{AttrValue, Store};
use tracing::{error, warn};

use crate::persisted::{metadata_attrs, read_metadata, StreamDataset};
use crate::{is_reserved, merge_data, Result};

/// Records written per container write call by [`StreamArray::to_store`].
const STORE_CHUNK: usize = 1 << 16;

/// A sorted record buffer with its metadata and free-form annotations.
///
/// The records are sorted non-decreasing by timestamp at all times:
/// constructors re-sort (stably) with a warning when handed unsorted data.
/// Transforms mutate in place and return `&mut Self` so they can be chained:
///
/// ```rust
/// use dataset::{Record, StreamArray};
///
/// let mut ds = StreamArray::new(vec![Record::new(7, 3, 1, 1, 0), Record::new(8, 3, 2, 1, 4)]);
/// ds.hash_streams(2).time_window(10);
/// assert_eq!(ds.len(), 4);
/// assert_eq!(ds.metadata().ts_range(), (0, 14));
/// ```
///
/// `Clone` is a deep copy: the clone owns its own records, metadata and
/// annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamArray {
    records: Vec<Record>,
    metadata: Metadata,
    /// Provenance annotations; never interpreted by the engine.
    attrs: BTreeMap<String, AttrValue>,
}

fn ensure_sorted(records: &mut [Record]) {
    if !is_sorted_by_ts(records) {
        warn!(
            "Records passed to StreamArray were not sorted by timestamp, sorting {} records",
            records.len()
        );
        records.sort_by_key(|r| r.timestamp);
    }
}

impl StreamArray {
    /// Builds a dataset over `records`, computing its metadata.
    #[must_use]
    pub fn new(mut records: Vec<Record>) -> Self {
        ensure_sorted(&mut records);
        let metadata = Metadata::analyze(&records);
        Self {
            records,
            metadata,
            attrs: BTreeMap::new(),
        }
    }

    /// Builds a dataset over `records` with metadata supplied by the caller.
    ///
    /// The metadata is trusted as-is; it may describe a superset of the
    /// records (see [`slice`](Self::slice)).
    #[must_use]
    pub fn with_metadata(mut records: Vec<Record>, metadata: Metadata) -> Self {
        ensure_sorted(&mut records);
        Self {
            records,
            metadata,
            attrs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut BTreeMap<String, AttrValue> {
        &mut self.attrs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Replaces every stream id by `id mod n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not positive.
    pub fn hash_streams(&mut self, n: i16) -> &mut Self {
        for r in &mut self.records {
            r.stream_id = modulo_id(r.stream_id, n);
        }
        self.metadata.hash_streams(n);
        self
    }

    /// Replaces every source id by `id mod n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not positive.
    pub fn hash_sources(&mut self, n: i16) -> &mut Self {
        for r in &mut self.records {
            r.source_id = modulo_id(r.source_id, n);
        }
        self.metadata.hash_sources(n);
        self
    }

    /// Flips the sign of every update count.
    pub fn negate(&mut self) -> &mut Self {
        for r in &mut self.records {
            r.update_count = r.update_count.wrapping_neg();
        }
        self
    }

    /// Adds `delta` to every timestamp.
    pub fn time_shift(&mut self, delta: i32) -> &mut Self {
        for r in &mut self.records {
            r.timestamp = r.timestamp.wrapping_add(delta);
        }
        self.metadata.time_shift(delta);
        self
    }

    /// Merges `other`'s records into this dataset by timestamp.
    ///
    /// On equal timestamps this dataset's records come first.
    pub fn merge(&mut self, other: &StreamArray) -> &mut Self {
        self.records = merge_data(&[&self.records, &other.records]);
        self.metadata.merge(&other.metadata);
        self
    }

    /// Applies a sliding window of width `delta`.
    ///
    /// Every record gets a closing twin `delta` time units later with its
    /// update count negated, so a running sum over the result only counts
    /// the trailing `delta` window.
    pub fn time_window(&mut self, delta: i32) -> &mut Self {
        let mut twin_meta = self.metadata.clone();
        twin_meta.time_shift(delta);
        let twin = StreamArray {
            records: self.records.iter().map(|r| r.closing_twin(delta)).collect(),
            metadata: twin_meta,
            attrs: BTreeMap::new(),
        };
        self.merge(&twin)
    }

    /// Returns a new dataset over `self.records[range]`.
    ///
    /// Out-of-range bounds are clamped to the dataset. The new
    /// metadata narrows only the time range (first and last timestamp of the
    /// slice); the key range and id sets are copied unchanged and may
    /// describe values absent from the slice. An empty slice keeps the parent's
    /// time range. Annotations are not carried over.
    #[must_use]
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> StreamArray {
        let len = self.records.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);

        let records = self.records[start..end].to_vec();
        let mut metadata = self.metadata.clone();
        metadata.length = records.len();
        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            metadata.ts_min = first.timestamp;
            metadata.ts_max = last.timestamp;
        }
        StreamArray {
            records,
            metadata,
            attrs: BTreeMap::new(),
        }
    }

    /// Returns the smallest index `i` such that every record before `i` has
    /// timestamp `< t`. May equal `len()` (past-the-end).
    #[must_use]
    pub fn time_index(&self, t: i32) -> usize {
        self.records.partition_point(|r| r.timestamp < t)
    }

    /// Timestamp of the first record.
    #[must_use]
    pub fn tstart(&self) -> Option<i32> {
        self.records.first().map(|r| r.timestamp)
    }

    /// Timestamp of the last record plus one.
    #[must_use]
    pub fn tend(&self) -> Option<i64> {
        self.records.last().map(|r| i64::from(r.timestamp) + 1)
    }

    /// `tend() - tstart()`.
    #[must_use]
    pub fn tlen(&self) -> Option<i64> {
        Some(self.tend()? - i64::from(self.tstart()?))
    }

    /// Saves this dataset as container `name` in `store` and returns a handle on it.
    ///
    /// The reserved attributes are written from this dataset's metadata, not
    /// recomputed. User annotations using a reserved name are ignored with a
    /// warning; annotations that fail to save are logged and skipped.
    pub fn to_store(&self, store: &Store, name: &str, overwrite: bool) -> Result<StreamDataset> {
        let mut container = store.create(name, self.records.len() as u64, overwrite)?;
        let mut pos = 0u64;
        for chunk in self.records.chunks(STORE_CHUNK) {
            container.write(pos, chunk)?;
            pos += chunk.len() as u64;
        }
        container.sync()?;

        for (attr, value) in metadata_attrs(&self.metadata) {
            container.set_attr(attr, value)?;
        }

        for (attr, value) in &self.attrs {
            if is_reserved(attr) {
                warn!(
                    "Ignoring user-defined attribute '{}' with a value of {} on '{}'",
                    attr, value, name
                );
                continue;
            }
            if let Err(e) = container.set_attr(attr, value.clone()) {
                error!("Failed to save attribute {}={} on '{}': {}", attr, value, name, e);
            }
        }

        StreamDataset::from_container(container)
    }

    /// Loads container `name` from `store` into memory.
    ///
    /// The metadata comes from the stored reserved attributes; every other
    /// attribute becomes an annotation.
    pub fn from_store(store: &Store, name: &str) -> Result<StreamArray> {
        let mut container = store.open_container(name)?;
        let metadata = read_metadata(&container)?;
        let records = container.read(0, container.len() as usize)?;
        let mut array = StreamArray::with_metadata(records, metadata);
        array.attrs = container
            .attrs()
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(array)
    }
}

impl<'a> IntoIterator for &'a StreamArray {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl From<Vec<Record>> for StreamArray {
    fn from(records: Vec<Record>) -> Self {
        StreamArray::new(records)
    }
}
