//! Store-backed datasets.
//!
//! A [`StreamDataset`] is a thin view over one container in a [`Store`]. Its
//! metadata lives in the container's reserved attributes and is read back at
//! open time instead of being recomputed. Column transforms rewrite the
//! container chunk by chunk, so memory stays bounded by the configured scan
//! chunk regardless of the dataset size.

use config::{MergeConfig, DEFAULT_SCAN_CHUNK};
use record::{is_sorted_by_ts, modulo_id, Metadata, Record};
use std::collections::BTreeSet;
use std::ops::{Bound, RangeBounds};
use store::{AttrValue, Container, Store, StoreError};
use tracing::{debug, warn};

use crate::{is_reserved, Error, Result, StreamArray};
use crate::{KEY_RANGE, SOURCE_IDS, STREAM_IDS, TS_RANGE};

/// The four reserved attributes describing `meta`.
pub(crate) fn metadata_attrs(meta: &Metadata) -> [(&'static str, AttrValue); 4] {
    [
        (TS_RANGE, AttrValue::I32Array(vec![meta.ts_min, meta.ts_max])),
        (KEY_RANGE, AttrValue::I32Array(vec![meta.key_min, meta.key_max])),
        (
            STREAM_IDS,
            AttrValue::I16Array(meta.stream_ids.iter().copied().collect()),
        ),
        (
            SOURCE_IDS,
            AttrValue::I16Array(meta.source_ids.iter().copied().collect()),
        ),
    ]
}

fn write_metadata(container: &mut Container, meta: &Metadata) -> Result<()> {
    for (name, value) in metadata_attrs(meta) {
        container.set_attr(name, value)?;
    }
    Ok(())
}

/// Assembles a [`Metadata`] from the reserved attributes of `container`.
///
/// Touches no record data. A missing attribute is
/// [`Error::MissingMetadata`]; one of the wrong shape is [`Error::Format`].
pub(crate) fn read_metadata(container: &Container) -> Result<Metadata> {
    let name = container.name();
    let get = |attr: &'static str| {
        container.attr(attr).ok_or_else(|| Error::MissingMetadata {
            name: name.to_string(),
            attr,
        })
    };
    let bad_shape = |attr: &str, expected: &str| {
        Error::Format(format!(
            "dataset '{}': attribute '{}' must be {}",
            name, attr, expected
        ))
    };

    let (ts_min, ts_max) = get(TS_RANGE)?
        .as_i32_pair()
        .ok_or_else(|| bad_shape(TS_RANGE, "an i32 pair"))?;
    let (key_min, key_max) = get(KEY_RANGE)?
        .as_i32_pair()
        .ok_or_else(|| bad_shape(KEY_RANGE, "an i32 pair"))?;
    let stream_ids: BTreeSet<i16> = get(STREAM_IDS)?
        .as_i16_slice()
        .ok_or_else(|| bad_shape(STREAM_IDS, "an i16 array"))?
        .iter()
        .copied()
        .collect();
    let source_ids: BTreeSet<i16> = get(SOURCE_IDS)?
        .as_i16_slice()
        .ok_or_else(|| bad_shape(SOURCE_IDS, "an i16 array"))?
        .iter()
        .copied()
        .collect();

    Ok(Metadata {
        length: container.len() as usize,
        ts_min,
        ts_max,
        key_min,
        key_max,
        stream_ids,
        source_ids,
    })
}

/// Computes the metadata of `container` from its records and writes the four
/// reserved attributes.
///
/// Reads `chunk` records at a time. This is the final step of every operation
/// that produces a container; a container without these attributes is not a
/// valid dataset.
pub fn decorate(container: &mut Container, chunk: usize) -> Result<Metadata> {
    let chunk = chunk.max(1);
    let len = container.len();
    let mut meta = Metadata::default();
    let mut buf = Vec::with_capacity(chunk.min(len as usize));
    let mut pos = 0u64;
    while pos < len {
        let n = (chunk as u64).min(len - pos) as usize;
        container.read_into(pos, n, &mut buf)?;
        meta.merge(&Metadata::analyze(&buf));
        pos += n as u64;
    }
    write_metadata(container, &meta)?;
    debug!("Decorated '{}': {}", container.name(), meta);
    Ok(meta)
}

/// A dataset stored in a container.
///
/// Holds an open [`Container`] and the metadata read from its reserved
/// attributes. Methods that read records take `&mut self` because the
/// container seeks its file handle.
#[derive(Debug)]
pub struct StreamDataset {
    container: Container,
    metadata: Metadata,
    scan_chunk: usize,
}

impl StreamDataset {
    /// Opens the existing dataset `name`.
    ///
    /// Fails with [`Error::MissingMetadata`] if any reserved attribute is
    /// absent, before any record is read.
    pub fn open(store: &Store, name: &str) -> Result<Self> {
        let container = store.open_container(name)?;
        Self::from_container(container)
    }

    /// Creates dataset `name` holding `records`, then decorates it.
    ///
    /// Unsorted input is sorted (stably) with a warning.
    pub fn create(store: &Store, name: &str, records: &[Record], overwrite: bool) -> Result<Self> {
        Self::create_with(store, name, records, overwrite, &MergeConfig::default())
    }

    /// [`create`](Self::create), writing and decorating `config.scan_chunk`
    /// records at a time. The returned handle keeps that chunk size.
    pub fn create_with(
        store: &Store,
        name: &str,
        records: &[Record],
        overwrite: bool,
        config: &MergeConfig,
    ) -> Result<Self> {
        let chunk = config.scan_chunk.max(1);
        let sorted;
        let records = if is_sorted_by_ts(records) {
            records
        } else {
            warn!(
                "Records passed to StreamDataset '{}' were not sorted by timestamp, sorting {} records",
                name,
                records.len()
            );
            let mut copy = records.to_vec();
            copy.sort_by_key(|r| r.timestamp);
            sorted = copy;
            &sorted
        };

        let mut container = store.create(name, records.len() as u64, overwrite)?;
        let mut pos = 0u64;
        for part in records.chunks(chunk) {
            container.write(pos, part)?;
            pos += part.len() as u64;
        }
        container.sync()?;
        let metadata = decorate(&mut container, chunk)?;
        Ok(Self {
            container,
            metadata,
            scan_chunk: chunk,
        })
    }

    pub(crate) fn from_container(container: Container) -> Result<Self> {
        let metadata = read_metadata(&container)?;
        Ok(Self {
            container,
            metadata,
            scan_chunk: DEFAULT_SCAN_CHUNK,
        })
    }

    /// Sets how many records column transforms and copies process at a time.
    /// Zero is clamped to 1.
    #[must_use]
    pub fn with_scan_chunk(mut self, records: usize) -> Self {
        self.scan_chunk = records.max(1);
        self
    }

    /// Records processed per step by column transforms.
    #[must_use]
    pub fn scan_chunk(&self) -> usize {
        self.scan_chunk
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.container.name()
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// A second handle on the backing container, for independent scanning.
    pub(crate) fn reader(&self) -> Result<Container> {
        Ok(self.container.try_clone()?)
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.container.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Metadata as stored in the reserved attributes.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn ts_range(&self) -> (i32, i32) {
        self.metadata.ts_range()
    }

    #[must_use]
    pub fn mintime(&self) -> i32 {
        self.metadata.ts_min
    }

    #[must_use]
    pub fn maxtime(&self) -> i32 {
        self.metadata.ts_max
    }

    #[must_use]
    pub fn key_range(&self) -> (i32, i32) {
        self.metadata.key_range()
    }

    #[must_use]
    pub fn minkey(&self) -> i32 {
        self.metadata.key_min
    }

    #[must_use]
    pub fn maxkey(&self) -> i32 {
        self.metadata.key_max
    }

    #[must_use]
    pub fn stream_ids(&self) -> &BTreeSet<i16> {
        &self.metadata.stream_ids
    }

    #[must_use]
    pub fn source_ids(&self) -> &BTreeSet<i16> {
        &self.metadata.source_ids
    }

    /// Timestamp of the first record, read from disk.
    pub fn tstart(&mut self) -> Result<Option<i32>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.container.read_one(0)?.timestamp))
    }

    /// Timestamp of the last record plus one, read from disk.
    pub fn tend(&mut self) -> Result<Option<i64>> {
        if self.is_empty() {
            return Ok(None);
        }
        let last = self.container.read_one(self.len() - 1)?;
        Ok(Some(i64::from(last.timestamp) + 1))
    }

    pub fn tlen(&mut self) -> Result<Option<i64>> {
        match (self.tstart()?, self.tend()?) {
            (Some(start), Some(end)) => Ok(Some(end - i64::from(start))),
            _ => Ok(None),
        }
    }

    /// Returns the smallest index `i` such that every record before `i` has
    /// timestamp `< t`; may equal `len()`.
    ///
    /// Binary search over the on-disk records, one record read per step.
    pub fn time_index(&mut self, t: i32) -> Result<u64> {
        let (mut lo, mut hi) = (0u64, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.container.read_one(mid)?.timestamp < t {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Reads the records in `range` (clamped to the dataset).
    pub fn read<R: RangeBounds<u64>>(&mut self, range: R) -> Result<Vec<Record>> {
        let len = self.len();
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
        Ok(self.container.read(start, (end - start) as usize)?)
    }

    /// Loads the whole dataset into memory.
    ///
    /// The metadata is recomputed from the records; user attributes are
    /// carried over as annotations.
    pub fn to_array(&mut self) -> Result<StreamArray> {
        let records = self.read(..)?;
        let mut array = StreamArray::new(records);
        array
            .attrs_mut()
            .extend(self.user_attrs().map(|(k, v)| (k.to_string(), v.clone())));
        Ok(array)
    }

    /// Copies records and attributes into a new dataset `name`.
    ///
    /// `store` must be the store holding this dataset.
    pub fn copy_to(&self, store: &Store, name: &str, overwrite: bool) -> Result<StreamDataset> {
        if store.data_path(self.name()) != self.container.data_path() {
            return Err(Error::Store(StoreError::NotFound(self.name().to_string())));
        }
        let target = store.copy(self.name(), name, overwrite)?;
        Ok(StreamDataset::from_container(target)?.with_scan_chunk(self.scan_chunk))
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.container.attr(name)
    }

    /// Attributes other than the reserved ones.
    pub fn user_attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.container
            .attrs()
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Stores a user attribute. Reserved names are rejected.
    pub fn set_attr(&mut self, name: &str, value: AttrValue) -> Result<()> {
        if is_reserved(name) {
            return Err(Error::InvalidAttribute {
                name: name.to_string(),
                reason: "reserved for dataset metadata",
            });
        }
        self.container.set_attr(name, value)?;
        Ok(())
    }

    fn map_records<F: FnMut(&mut Record)>(&mut self, mut f: F) -> Result<()> {
        let len = self.len();
        let mut buf = Vec::with_capacity(self.scan_chunk.min(len as usize));
        let mut pos = 0u64;
        while pos < len {
            let n = (self.scan_chunk as u64).min(len - pos) as usize;
            self.container.read_into(pos, n, &mut buf)?;
            for r in &mut buf {
                f(r);
            }
            self.container.write(pos, &buf)?;
            pos += n as u64;
        }
        self.container.sync()?;
        Ok(())
    }

    /// Replaces every stream id on disk by `id mod n` and updates the attributes.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not positive.
    pub fn hash_streams(&mut self, n: i16) -> Result<&mut Self> {
        assert!(n > 0, "id modulus must be positive, got {}", n);
        self.map_records(|r| r.stream_id = modulo_id(r.stream_id, n))?;
        self.metadata.hash_streams(n);
        write_metadata(&mut self.container, &self.metadata)?;
        Ok(self)
    }

    /// Replaces every source id on disk by `id mod n` and updates the attributes.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not positive.
    pub fn hash_sources(&mut self, n: i16) -> Result<&mut Self> {
        assert!(n > 0, "id modulus must be positive, got {}", n);
        self.map_records(|r| r.source_id = modulo_id(r.source_id, n))?;
        self.metadata.hash_sources(n);
        write_metadata(&mut self.container, &self.metadata)?;
        Ok(self)
    }

    /// Flips the sign of every update count on disk.
    pub fn negate(&mut self) -> Result<&mut Self> {
        self.map_records(|r| r.update_count = r.update_count.wrapping_neg())?;
        Ok(self)
    }

    /// Adds `delta` to every timestamp on disk and to `ts_range`.
    pub fn time_shift(&mut self, delta: i32) -> Result<&mut Self> {
        self.map_records(|r| r.timestamp = r.timestamp.wrapping_add(delta))?;
        self.metadata.time_shift(delta);
        write_metadata(&mut self.container, &self.metadata)?;
        Ok(self)
    }

    /// Always fails: merging persisted data goes through [`cascade_merge`](crate::cascade_merge).
    pub fn merge(&mut self, _other: &StreamDataset) -> Result<&mut Self> {
        Err(Error::Unsupported("merge"))
    }

    /// Always fails: windowing persisted data goes through
    /// [`cascade_merge`](crate::cascade_merge) with a window width.
    pub fn time_window(&mut self, _delta: i32) -> Result<&mut Self> {
        Err(Error::Unsupported("time_window"))
    }
}
