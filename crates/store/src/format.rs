//! Data file header constants and read/write helpers.
//!
//! ```text
//! [magic: u32 LE][version: u16 LE][record_size: u16 LE][length: u64 LE][header_crc: u32 LE]
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use record::RECORD_BYTES;
use std::io::{self, Read, Write};

/// Magic number identifying a data file (ASCII "DSD1").
pub const DATA_MAGIC: u32 = 0x4453_4431;

/// Magic number identifying an attribute file (ASCII "DSA1").
pub const ATTR_MAGIC: u32 = 0x4453_4131;

/// Current data file version.
pub const DATA_VERSION: u16 = 1;

/// Size of the data file header: 4 + 2 + 2 + 8 + 4.
pub const HEADER_BYTES: u64 = 4 + 2 + 2 + 8 + 4;

/// File extension of container data files.
pub const DATA_EXTENSION: &str = "dsd";

/// File extension of container attribute files.
pub const ATTR_EXTENSION: &str = "dsa";

/// Parsed data file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u16,
    pub record_size: u16,
    pub length: u64,
    pub crc: u32,
}

impl Header {
    /// A fresh header for a container of `length` records.
    pub fn new(length: u64) -> Self {
        let mut h = Self {
            magic: DATA_MAGIC,
            version: DATA_VERSION,
            record_size: RECORD_BYTES as u16,
            length,
            crc: 0,
        };
        h.crc = h.compute_crc();
        h
    }

    fn body(&self) -> [u8; 16] {
        let mut body = [0u8; 16];
        body[0..4].copy_from_slice(&self.magic.to_le_bytes());
        body[4..6].copy_from_slice(&self.version.to_le_bytes());
        body[6..8].copy_from_slice(&self.record_size.to_le_bytes());
        body[8..16].copy_from_slice(&self.length.to_le_bytes());
        body
    }

    pub fn compute_crc(&self) -> u32 {
        let mut hasher = Crc32::new();
        hasher.update(&self.body());
        hasher.finalize()
    }

    /// Byte size of a data file holding this header and its records.
    pub fn file_size(&self) -> u64 {
        HEADER_BYTES + self.length * u64::from(self.record_size)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.body())?;
        w.write_u32::<LittleEndian>(self.crc)?;
        Ok(())
    }

    /// Reads a header without validating it; see [`Header::validate`].
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            magic: r.read_u32::<LittleEndian>()?,
            version: r.read_u16::<LittleEndian>()?,
            record_size: r.read_u16::<LittleEndian>()?,
            length: r.read_u64::<LittleEndian>()?,
            crc: r.read_u32::<LittleEndian>()?,
        })
    }

    /// Checks the header against the record layout this build understands.
    ///
    /// Returns a human-readable reason on mismatch.
    pub fn validate(&self, filesize: u64) -> Result<(), String> {
        if self.magic != DATA_MAGIC {
            return Err(format!("unknown magic {:#x}", self.magic));
        }
        if self.version != DATA_VERSION {
            return Err(format!("unsupported version {}", self.version));
        }
        if usize::from(self.record_size) != RECORD_BYTES {
            return Err(format!(
                "record size {} does not match the {}-byte record layout",
                self.record_size, RECORD_BYTES
            ));
        }
        if self.compute_crc() != self.crc {
            return Err(format!(
                "header crc mismatch: expected {:#010x}, got {:#010x}",
                self.crc,
                self.compute_crc()
            ));
        }
        if self.file_size() != filesize {
            return Err(format!(
                "file holds {} bytes but header describes {} records ({} bytes)",
                filesize,
                self.length,
                self.file_size()
            ));
        }
        Ok(())
    }
}
