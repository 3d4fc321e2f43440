//! WorldCup '98 access-log ingestion.
//!
//! The native trace is a flat file of 20-byte big-endian records:
//!
//! ```text
//! +-----------+-----------+-----------+---------+--------+--------+------+--------+
//! | timestamp | client_id | object_id |  size   | method | status | type | server |
//! |  u32 BE   |  u32 BE   |  u32 BE   | u32 BE  |   u8   |   u8   |  u8  |   u8   |
//! +-----------+-----------+-----------+---------+--------+--------+------+--------+
//! ```
//!
//! [`from_wcup`] maps one byte field onto `stream_id`, one id field onto
//! `key`, `server` onto `source_id`, and sets every update count to 1.

use byteorder::{BigEndian, ByteOrder};
use record::Record;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::{AttrValue, Error, Result, StreamArray};

/// Size of one native trace record.
pub const WCUP_RECORD_BYTES: usize = 20;

/// One record of the native trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WcupRecord {
    pub timestamp: u32,
    pub client_id: u32,
    pub object_id: u32,
    pub size: u32,
    pub method: u8,
    pub status: u8,
    pub kind: u8,
    pub server: u8,
}

impl WcupRecord {
    /// Decodes a record from the first [`WCUP_RECORD_BYTES`] bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`WCUP_RECORD_BYTES`].
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            timestamp: BigEndian::read_u32(&buf[0..4]),
            client_id: BigEndian::read_u32(&buf[4..8]),
            object_id: BigEndian::read_u32(&buf[8..12]),
            size: BigEndian::read_u32(&buf[12..16]),
            method: buf[16],
            status: buf[17],
            kind: buf[18],
            server: buf[19],
        }
    }

    /// Encodes this record into the first [`WCUP_RECORD_BYTES`] bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`WCUP_RECORD_BYTES`].
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u32(&mut buf[0..4], self.timestamp);
        BigEndian::write_u32(&mut buf[4..8], self.client_id);
        BigEndian::write_u32(&mut buf[8..12], self.object_id);
        BigEndian::write_u32(&mut buf[12..16], self.size);
        buf[16] = self.method;
        buf[17] = self.status;
        buf[18] = self.kind;
        buf[19] = self.server;
    }
}

/// Trace field used as `stream_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidField {
    #[default]
    Type,
    Method,
    Status,
}

impl SidField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SidField::Type => "type",
            SidField::Method => "method",
            SidField::Status => "status",
        }
    }

    fn extract(self, rec: &WcupRecord) -> i16 {
        i16::from(match self {
            SidField::Type => rec.kind,
            SidField::Method => rec.method,
            SidField::Status => rec.status,
        })
    }
}

impl fmt::Display for SidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SidField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "type" => Ok(SidField::Type),
            "method" => Ok(SidField::Method),
            "status" => Ok(SidField::Status),
            other => Err(format!(
                "unknown stream id field '{}', expected type, method or status",
                other
            )),
        }
    }
}

/// Trace field used as `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyField {
    #[default]
    ClientId,
    ObjectId,
}

impl KeyField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeyField::ClientId => "clientID",
            KeyField::ObjectId => "objectID",
        }
    }

    fn extract(self, rec: &WcupRecord) -> i32 {
        let v = match self {
            KeyField::ClientId => rec.client_id,
            KeyField::ObjectId => rec.object_id,
        };
        v as i32
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "clientid" | "client_id" => Ok(KeyField::ClientId),
            "objectid" | "object_id" => Ok(KeyField::ObjectId),
            other => Err(format!(
                "unknown key field '{}', expected clientID or objectID",
                other
            )),
        }
    }
}

/// Decodes a native trace held in memory.
pub fn parse_wcup(bytes: &[u8]) -> Result<Vec<WcupRecord>> {
    if bytes.len() % WCUP_RECORD_BYTES != 0 {
        return Err(Error::Format(format!(
            "WorldCup trace length {} is not a multiple of {}",
            bytes.len(),
            WCUP_RECORD_BYTES
        )));
    }
    Ok(bytes
        .chunks_exact(WCUP_RECORD_BYTES)
        .map(WcupRecord::decode)
        .collect())
}

/// Reads a native trace file.
pub fn read_wcup<P: AsRef<Path>>(path: P) -> Result<Vec<WcupRecord>> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_wcup(&bytes)
}

/// Converts trace records into a dataset.
///
/// The result is annotated with `origin`, `sid_field` and `key_field`.
/// Timestamps and keys above `i32::MAX` wrap.
#[must_use]
pub fn from_wcup(
    records: &[WcupRecord],
    sid_field: SidField,
    key_field: KeyField,
    origin: &str,
) -> StreamArray {
    let converted = records
        .iter()
        .map(|w| {
            Record::new(
                sid_field.extract(w),
                i16::from(w.server),
                key_field.extract(w),
                1,
                w.timestamp as i32,
            )
        })
        .collect();
    let mut array = StreamArray::new(converted);
    let attrs = array.attrs_mut();
    attrs.insert("origin".to_string(), AttrValue::from(origin));
    attrs.insert("sid_field".to_string(), AttrValue::from(sid_field.as_str()));
    attrs.insert("key_field".to_string(), AttrValue::from(key_field.as_str()));
    array
}

/// Reads the trace at `path` and converts it, with `origin` set to the path.
pub fn load_wcup<P: AsRef<Path>>(
    path: P,
    sid_field: SidField,
    key_field: KeyField,
) -> Result<StreamArray> {
    let path = path.as_ref();
    let records = read_wcup(path)?;
    Ok(from_wcup(
        &records,
        sid_field,
        key_field,
        &path.display().to_string(),
    ))
}
