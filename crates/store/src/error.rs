use std::io;
use thiserror::Error;

/// A convenience `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file does not hold a record container of the expected layout.
    #[error("container '{name}' has an invalid format: {reason}")]
    Format { name: String, reason: String },

    /// A container by this name exists and overwriting was not requested.
    #[error("container name '{0}' is already in use")]
    NameConflict(String),

    /// No container by this name exists.
    #[error("container '{0}' not found")]
    NotFound(String),

    /// The name cannot be used as a container name.
    #[error("invalid container name {0:?}")]
    InvalidName(String),

    /// A read or write touched records past the end of the container.
    #[error("records {start}..{end} out of bounds for container of length {len}")]
    OutOfRange { start: u64, end: u64, len: u64 },

    /// Checksum mismatch or undecodable bytes.
    #[error("corrupt {what} in container '{name}'")]
    Corrupt { name: String, what: &'static str },
}
