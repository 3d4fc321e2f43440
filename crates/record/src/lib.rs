//! # Record - the atomic unit of a stream dataset
//!
//! Every dataset handled by dsprep is an append-only sequence of fixed-size
//! [`Record`]s, globally sorted by timestamp. This crate defines the record
//! layout, its binary codec, and [`Metadata`], the summary statistics that
//! describe a record sequence.
//!
//! ## Binary layout (16 bytes, little-endian)
//!
//! ```text
//! ┌────────────┬────────────┬──────────┬──────────────┬────────────┐
//! │ stream_id  │ source_id  │ key      │ update_count │ timestamp  │
//! │ i16        │ i16        │ i32      │ i32          │ i32        │
//! └────────────┴────────────┴──────────┴──────────────┴────────────┘
//!   0            2            4          8              12        16
//! ```
//!
//! ## Example
//!
//! ```rust
//! use record::{Metadata, Record};
//!
//! let data = vec![Record::new(1, 0, 42, 1, 10), Record::new(3, 2, 7, 1, 12)];
//! let meta = Metadata::analyze(&data);
//! assert_eq!(meta.ts_range(), (10, 12));
//! assert_eq!(meta.key_range(), (7, 42));
//! ```

mod metadata;
mod record;

pub use metadata::{modulo_id, Metadata};
pub use record::{is_sorted_by_ts, Record, RECORD_BYTES};
