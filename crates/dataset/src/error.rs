use std::io;
use store::StoreError;
use thiserror::Error;

/// A convenience `Result` type for dataset operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening, creating, transforming or merging datasets.
#[derive(Debug, Error)]
pub enum Error {
    /// Record layout mismatch or malformed input bytes. Never recovered.
    #[error("format error: {0}")]
    Format(String),

    /// An existing container lacks one of the reserved attributes.
    #[error("dataset '{name}' is missing required attribute '{attr}'")]
    MissingMetadata { name: String, attr: &'static str },

    /// A dataset by this name exists and overwriting was not requested.
    #[error("dataset name '{0}' is already in use")]
    NameConflict(String),

    /// The operation needs the cascade merge engine.
    #[error("{0} is not supported on a persisted dataset, use cascade_merge instead")]
    Unsupported(&'static str),

    /// The merge driver wrote a different number of records than planned.
    #[error("merge wrote {actual} records, expected {expected}")]
    CountMismatch { expected: u64, actual: u64 },

    /// A user attribute was rejected.
    #[error("attribute '{name}' rejected: {reason}")]
    InvalidAttribute { name: String, reason: &'static str },

    /// Any other store failure (I/O, corruption, missing container, ...).
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Format { name, reason } => {
                Error::Format(format!("container '{}': {}", name, reason))
            }
            StoreError::NameConflict(name) => Error::NameConflict(name),
            other => Error::Store(other),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Store(StoreError::Io(e))
    }
}
