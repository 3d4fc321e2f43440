use record::Record;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::container::Container;
use crate::format::{Header, ATTR_EXTENSION, DATA_EXTENSION};
use crate::{Result, StoreError};

/// Records copied per chunk by [`Store::copy`].
const COPY_CHUNK: usize = 1 << 16;

/// A directory of named record containers.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Opens the store rooted at `root`, creating the directory if needed.
    ///
    /// Leftover `.dsa.tmp` files from interrupted attribute writes are removed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Self::cleanup_tmp_files(&root);
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(|c: char| c == '/' || c == '\\' || c.is_control())
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Path of the data file for container `name` (which need not exist).
    #[must_use]
    pub fn data_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, DATA_EXTENSION))
    }

    fn attr_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, ATTR_EXTENSION))
    }

    /// Returns `true` if a container named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        Self::check_name(name).is_ok() && self.data_path(name).exists()
    }

    /// Names of all containers, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|x| x == DATA_EXTENSION).unwrap_or(false))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Creates a zero-filled container of exactly `len` records.
    ///
    /// If `name` is taken, fails with [`StoreError::NameConflict`] unless
    /// `overwrite` is set, in which case the old container is removed first.
    pub fn create(&self, name: &str, len: u64, overwrite: bool) -> Result<Container> {
        Self::check_name(name)?;
        if self.contains(name) {
            if !overwrite {
                return Err(StoreError::NameConflict(name.to_string()));
            }
            self.remove(name)?;
        }

        let data_path = self.data_path(name);
        let attr_path = self.attr_path(name);
        // A stale attribute file without data must not leak into the new container.
        remove_if_exists(&attr_path)?;

        let header = Header::new(len);
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&data_path)?;
        {
            let mut w = BufWriter::new(&file);
            header.write_to(&mut w)?;
            w.flush()?;
        }
        file.set_len(header.file_size())?;

        debug!("Created container '{}' with {} records", name, len);
        Container::new(name.to_string(), data_path, attr_path, file, len)
    }

    /// Opens an existing container, validating its header.
    pub fn open_container(&self, name: &str) -> Result<Container> {
        Self::check_name(name)?;
        let data_path = self.data_path(name);
        let mut file = match OpenOptions::new().read(true).write(true).open(&data_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let filesize = file.metadata()?.len();
        let format_err = |reason: String| StoreError::Format {
            name: name.to_string(),
            reason,
        };

        let header = match Header::read_from(&mut file) {
            Ok(h) => h,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(format_err("file too small for header".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        header.validate(filesize).map_err(format_err)?;

        Container::new(
            name.to_string(),
            data_path,
            self.attr_path(name),
            file,
            header.length,
        )
    }

    /// Deletes a container (data and attributes).
    pub fn remove(&self, name: &str) -> Result<()> {
        Self::check_name(name)?;
        let data_path = self.data_path(name);
        if !data_path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        fs::remove_file(&data_path)?;
        remove_if_exists(&self.attr_path(name))?;
        debug!("Removed container '{}'", name);
        Ok(())
    }

    /// Copies container `src` to `dst`, records and attributes, in chunks.
    pub fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<Container> {
        if src == dst {
            return Err(StoreError::NameConflict(dst.to_string()));
        }
        let mut source = self.open_container(src)?;
        let mut target = self.create(dst, source.len(), overwrite)?;

        let mut buf: Vec<Record> = Vec::with_capacity(COPY_CHUNK);
        let mut pos = 0u64;
        while pos < source.len() {
            let n = COPY_CHUNK.min((source.len() - pos) as usize);
            source.read_into(pos, n, &mut buf)?;
            target.write(pos, &buf)?;
            pos += n as u64;
        }
        for (name, value) in source.attrs().clone() {
            target.set_attr(&name, value)?;
        }
        target.sync()?;
        Ok(target)
    }

    fn cleanup_tmp_files(root: &Path) {
        if let Ok(entries) = fs::read_dir(root) {
            for entry in entries.flatten() {
                let p = entry.path();
                if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                    if name.ends_with(".dsa.tmp") {
                        let _ = fs::remove_file(&p);
                    }
                }
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
