//! Container attributes and their on-disk encoding.
//!
//! The attribute file is small and rewritten whole on every change, using the
//! same temp-file + fsync + rename sequence as a manifest so it is never
//! observed half-written.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::format::ATTR_MAGIC;

/// Largest attribute array we'll allocate while decoding. Prevents OOM on corrupt files.
const MAX_ATTR_ITEMS: usize = 16 * 1024 * 1024;

const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_STR: u8 = 2;
const TAG_I32_ARRAY: u8 = 3;
const TAG_I16_ARRAY: u8 = 4;

/// A value stored under an attribute name.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    I32Array(Vec<i32>),
    I16Array(Vec<i16>),
}

impl AttrValue {
    /// Returns the value as a pair of `i32`, if it is a two-element `I32Array`.
    #[must_use]
    pub fn as_i32_pair(&self) -> Option<(i32, i32)> {
        match self {
            AttrValue::I32Array(v) if v.len() == 2 => Some((v[0], v[1])),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i16_slice(&self) -> Option<&[i16]> {
        match self {
            AttrValue::I16Array(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            AttrValue::Int(v) => {
                w.write_u8(TAG_INT)?;
                w.write_i64::<LittleEndian>(*v)?;
            }
            AttrValue::Float(v) => {
                w.write_u8(TAG_FLOAT)?;
                w.write_f64::<LittleEndian>(*v)?;
            }
            AttrValue::Str(s) => {
                w.write_u8(TAG_STR)?;
                w.write_u32::<LittleEndian>(len_u32(s.len())?)?;
                w.write_all(s.as_bytes())?;
            }
            AttrValue::I32Array(v) => {
                w.write_u8(TAG_I32_ARRAY)?;
                w.write_u32::<LittleEndian>(len_u32(v.len())?)?;
                for x in v {
                    w.write_i32::<LittleEndian>(*x)?;
                }
            }
            AttrValue::I16Array(v) => {
                w.write_u8(TAG_I16_ARRAY)?;
                w.write_u32::<LittleEndian>(len_u32(v.len())?)?;
                for x in v {
                    w.write_i16::<LittleEndian>(*x)?;
                }
            }
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let tag = r.read_u8()?;
        let value = match tag {
            TAG_INT => AttrValue::Int(r.read_i64::<LittleEndian>()?),
            TAG_FLOAT => AttrValue::Float(r.read_f64::<LittleEndian>()?),
            TAG_STR => {
                let len = read_len(r)?;
                let mut buf = vec![0u8; len];
                r.read_exact(&mut buf)?;
                AttrValue::Str(String::from_utf8(buf).map_err(|_| invalid("non utf-8 string"))?)
            }
            TAG_I32_ARRAY => {
                let len = read_len(r)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(r.read_i32::<LittleEndian>()?);
                }
                AttrValue::I32Array(v)
            }
            TAG_I16_ARRAY => {
                let len = read_len(r)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(r.read_i16::<LittleEndian>()?);
                }
                AttrValue::I16Array(v)
            }
            other => return Err(invalid(&format!("unknown attribute tag {}", other))),
        };
        Ok(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Str(s) => write!(f, "{:?}", s),
            AttrValue::I32Array(v) => write!(f, "{:?}", v),
            AttrValue::I16Array(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<i32>> for AttrValue {
    fn from(v: Vec<i32>) -> Self {
        AttrValue::I32Array(v)
    }
}

impl From<Vec<i16>> for AttrValue {
    fn from(v: Vec<i16>) -> Self {
        AttrValue::I16Array(v)
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "attribute value too large")
    })
}

fn read_len<R: Read>(r: &mut R) -> io::Result<usize> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len > MAX_ATTR_ITEMS {
        return Err(invalid("attribute length exceeds maximum"));
    }
    Ok(len)
}

/// Serializes an attribute map into the framed file body.
pub(crate) fn encode(attrs: &BTreeMap<String, AttrValue>) -> io::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(64);
    body.write_u32::<LittleEndian>(len_u32(attrs.len())?)?;
    for (name, value) in attrs {
        let name_len = u16::try_from(name.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "attribute name too long"))?;
        body.write_u16::<LittleEndian>(name_len)?;
        body.extend_from_slice(name.as_bytes());
        value.write_to(&mut body)?;
    }

    let mut hasher = Crc32::new();
    hasher.update(&body);

    let mut out = Vec::with_capacity(body.len() + 8);
    out.write_u32::<LittleEndian>(ATTR_MAGIC)?;
    out.write_u32::<LittleEndian>(hasher.finalize())?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parses a framed attribute file body. Any framing, checksum or decoding
/// problem is reported as `InvalidData`.
pub(crate) fn decode(bytes: &[u8]) -> io::Result<BTreeMap<String, AttrValue>> {
    let mut r = bytes;
    let magic = r.read_u32::<LittleEndian>()?;
    if magic != ATTR_MAGIC {
        return Err(invalid("bad attribute file magic"));
    }
    let crc = r.read_u32::<LittleEndian>()?;
    let mut hasher = Crc32::new();
    hasher.update(r);
    if hasher.finalize() != crc {
        return Err(invalid("attribute file crc mismatch"));
    }

    let count = r.read_u32::<LittleEndian>()? as usize;
    let mut attrs = BTreeMap::new();
    for _ in 0..count {
        let name_len = r.read_u16::<LittleEndian>()? as usize;
        let mut name = vec![0u8; name_len];
        r.read_exact(&mut name)?;
        let name = String::from_utf8(name).map_err(|_| invalid("non utf-8 attribute name"))?;
        let value = AttrValue::read_from(&mut r)?;
        attrs.insert(name, value);
    }
    Ok(attrs)
}

/// Loads the attribute file at `path`. A missing file is an empty map.
pub(crate) fn load(path: &Path) -> io::Result<BTreeMap<String, AttrValue>> {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e),
    }
}

/// Atomically replaces the attribute file at `path`.
pub(crate) fn save(path: &Path, attrs: &BTreeMap<String, AttrValue>) -> io::Result<()> {
    let bytes = encode(attrs)?;
    let tmp_path = path.with_extension(format!("{}.tmp", crate::format::ATTR_EXTENSION));
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        f.write_all(&bytes)?;
        f.flush()?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
