//! # Dataset - preparing, transforming and merging stream datasets
//!
//! A dataset is a sequence of [`Record`]s sorted by timestamp, described by a
//! [`Metadata`]. It comes in two shapes:
//!
//! | Type              | Lives in        | Used for                                   |
//! |-------------------|-----------------|--------------------------------------------|
//! | [`StreamArray`]   | memory          | small/medium data, eager transforms        |
//! | [`StreamDataset`] | a [`Store`]     | large data, chunked on-disk transforms     |
//!
//! ## Data flow
//!
//! ```text
//! WorldCup trace ──> wcup::from_wcup ──> StreamArray ──(to_store)──> StreamDataset
//!                                            │                            │
//!                                   merge / time_window           cascade_merge
//!                                      (merge_data)          (scanners + heap + writer)
//!                                            │                            │
//!                                            v                            v
//!                                       StreamArray                 StreamDataset
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                                   |
//! |---------------|-----------------------------------------------------------|
//! | [`seq_merge`] | `merge_data`: divide-and-conquer merge of sorted arrays    |
//! | [`array`]     | `StreamArray`: in-memory dataset and its transforms        |
//! | [`persisted`] | `StreamDataset`: store-backed dataset, decoration          |
//! | [`cascade`]   | `cascade_merge`: bounded-memory multiway merge             |
//! | [`window`]    | `TimeWindowIter`: streaming window-closing twins           |
//! | [`wcup`]      | WorldCup trace ingestion                                  |
//!
//! ## Window-closing twins
//!
//! `time_window(Δ)` adds, for every record `r`, a twin with timestamp
//! `r.ts + Δ` and update count `-r.upd`. A running sum of update counts over
//! the result therefore only reflects records of the trailing `Δ` time units.
//!
//! ## Reserved attributes
//!
//! Every persisted dataset carries `ts_range` and `key_range` (`i32` pairs)
//! plus `stream_ids` and `source_ids` (sorted distinct `i16` arrays). User
//! attributes may never overwrite them.

pub mod array;
pub mod cascade;
mod error;
pub mod persisted;
pub mod seq_merge;
pub mod wcup;
pub mod window;

pub use array::StreamArray;
pub use cascade::{cascade_merge, cascade_merge_with};
pub use error::{Error, Result};
pub use persisted::StreamDataset;
pub use seq_merge::merge_data;
pub use window::TimeWindowIter;

pub use config::MergeConfig;
pub use record::{Metadata, Record};
pub use store::{AttrValue, Store};

/// Attribute holding `[ts_min, ts_max]`.
pub const TS_RANGE: &str = "ts_range";
/// Attribute holding `[key_min, key_max]`.
pub const KEY_RANGE: &str = "key_range";
/// Attribute holding the sorted distinct stream ids.
pub const STREAM_IDS: &str = "stream_ids";
/// Attribute holding the sorted distinct source ids.
pub const SOURCE_IDS: &str = "source_ids";

/// Attribute names owned by the dataset layer.
pub const RESERVED_ATTRS: [&str; 4] = [TS_RANGE, KEY_RANGE, STREAM_IDS, SOURCE_IDS];

/// Returns `true` if `name` is one of the [`RESERVED_ATTRS`].
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_ATTRS.contains(&name)
}

#[cfg(test)]
mod tests;
