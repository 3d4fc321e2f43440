use record::{Record, RECORD_BYTES};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::attrs::{self, AttrValue};
use crate::format::HEADER_BYTES;
use crate::{Result, StoreError};

/// An open record container.
///
/// Holds a file handle on the data file and an in-memory copy of the
/// attributes. Reads and writes address records by index and never change
/// the container's length, which is fixed at creation.
///
/// A `Container` assumes exclusive access: no locking is done, and two
/// handles writing the same records concurrently is the caller's bug.
pub struct Container {
    name: String,
    data_path: PathBuf,
    attr_path: PathBuf,
    file: File,
    len: u64,
    attrs: BTreeMap<String, AttrValue>,
    /// Reusable encode/decode buffer.
    scratch: Vec<u8>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("data_path", &self.data_path)
            .field("attrs", &self.attrs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Container {
    pub(crate) fn new(
        name: String,
        data_path: PathBuf,
        attr_path: PathBuf,
        file: File,
        len: u64,
    ) -> Result<Self> {
        let attrs = attrs::load(&attr_path).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => StoreError::Corrupt {
                name: name.clone(),
                what: "attribute file",
            },
            _ => StoreError::Io(e),
        })?;
        Ok(Self {
            name,
            data_path,
            attr_path,
            file,
            len,
            attrs,
            scratch: Vec::new(),
        })
    }

    /// Opens a second handle on the same container.
    ///
    /// The handles share the underlying file description; every access seeks
    /// first, so they may be interleaved from a single thread.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            name: self.name.clone(),
            data_path: self.data_path.clone(),
            attr_path: self.attr_path.clone(),
            file: self.file.try_clone()?,
            len: self.len,
            attrs: self.attrs.clone(),
            scratch: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the data file (kept for diagnostics).
    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Number of records in the container.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_range(&self, start: u64, count: u64) -> Result<()> {
        let end = start.saturating_add(count);
        if end > self.len {
            return Err(StoreError::OutOfRange {
                start,
                end,
                len: self.len,
            });
        }
        Ok(())
    }

    fn seek_to(&mut self, index: u64) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(HEADER_BYTES + index * RECORD_BYTES as u64))?;
        Ok(())
    }

    /// Reads `count` records starting at `start`, replacing the contents of `out`.
    pub fn read_into(&mut self, start: u64, count: usize, out: &mut Vec<Record>) -> Result<()> {
        self.check_range(start, count as u64)?;
        out.clear();
        if count == 0 {
            return Ok(());
        }
        self.seek_to(start)?;
        self.scratch.resize(count * RECORD_BYTES, 0);
        self.file.read_exact(&mut self.scratch)?;
        out.extend(self.scratch.chunks_exact(RECORD_BYTES).map(Record::decode));
        Ok(())
    }

    /// Reads `count` records starting at `start`.
    pub fn read(&mut self, start: u64, count: usize) -> Result<Vec<Record>> {
        let mut out = Vec::with_capacity(count);
        self.read_into(start, count, &mut out)?;
        Ok(out)
    }

    /// Reads the single record at `index`.
    pub fn read_one(&mut self, index: u64) -> Result<Record> {
        self.check_range(index, 1)?;
        self.seek_to(index)?;
        let mut buf = [0u8; RECORD_BYTES];
        self.file.read_exact(&mut buf)?;
        Ok(Record::decode(&buf))
    }

    /// Overwrites records `start..start + records.len()`.
    ///
    /// The range must lie inside the container; containers never grow.
    pub fn write(&mut self, start: u64, records: &[Record]) -> Result<()> {
        self.check_range(start, records.len() as u64)?;
        if records.is_empty() {
            return Ok(());
        }
        self.scratch.clear();
        Record::encode_all(records, &mut self.scratch);
        self.seek_to(start)?;
        self.file.write_all(&self.scratch)?;
        Ok(())
    }

    /// Flushes written records to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Returns the attribute stored under `name`.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Attribute names in sorted order.
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(|k| k.as_str())
    }

    /// All attributes.
    #[must_use]
    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    /// Stores `value` under `name` and persists the attribute file.
    ///
    /// On failure the in-memory attributes are left unchanged.
    pub fn set_attr(&mut self, name: &str, value: AttrValue) -> Result<()> {
        let previous = self.attrs.insert(name.to_string(), value);
        if let Err(e) = attrs::save(&self.attr_path, &self.attrs) {
            match previous {
                Some(v) => self.attrs.insert(name.to_string(), v),
                None => self.attrs.remove(name),
            };
            return Err(e.into());
        }
        Ok(())
    }

    /// Removes the attribute `name`, returning its old value.
    pub fn remove_attr(&mut self, name: &str) -> Result<Option<AttrValue>> {
        let old = self.attrs.remove(name);
        if old.is_some() {
            attrs::save(&self.attr_path, &self.attrs)?;
        }
        Ok(old)
    }
}
