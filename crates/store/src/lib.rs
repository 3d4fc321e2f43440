//! # Store - named containers of fixed-size records
//!
//! The durable home of every persisted dataset. A [`Store`] is a directory;
//! each named [`Container`] inside it is a pre-sized array of
//! [`record::Record`]s plus a small bag of named attributes.
//!
//! Containers support exactly what the merge engine needs: create with a known
//! final length, contiguous read and write by index range, attribute get/set,
//! and delete/overwrite of a whole container.
//!
//! ## Files (per container `<name>`)
//!
//! ```text
//! <name>.dsd   DATA FILE
//! ┌───────────────────────────────────────────────────────────────┐
//! │ HEADER (20 bytes)                                             │
//! │ magic "DSD1" (u32) | version (u16) | record_size (u16)        │
//! │ length (u64) | header_crc (u32)                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │ RECORDS (length x 16 bytes)                                   │
//! │ stream_id i16 | source_id i16 | key i32 | upd i32 | ts i32    │
//! └───────────────────────────────────────────────────────────────┘
//!
//! <name>.dsa   ATTRIBUTE FILE (rewritten atomically via .dsa.tmp)
//! ┌───────────────────────────────────────────────────────────────┐
//! │ magic "DSA1" (u32) | crc32 (u32) | count (u32)                │
//! │ repeated: name_len (u16) | name | tag (u8) | payload          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. `header_crc` covers the 16 header bytes
//! before it; the attribute CRC covers `count` and every entry.
//!
//! A container whose data exists but whose attribute file is missing is still
//! a valid *container*; whether it is a valid *dataset* is decided one level
//! up, by the `dataset` crate.

mod attrs;
mod container;
mod error;
mod format;
mod store;

pub use attrs::AttrValue;
pub use container::Container;
pub use error::{Result, StoreError};
pub use format::{ATTR_EXTENSION, DATA_EXTENSION, DATA_MAGIC, HEADER_BYTES};
pub use store::Store;
