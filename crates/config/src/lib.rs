//! # Config - tuning knobs for dsprep
//!
//! Buffer sizes and reporting intervals are explicit values passed to the
//! code that needs them, never process-wide state. Each struct has a
//! `Default` with the documented values and a `from_env()` constructor that
//! lets the CLI override them:
//!
//! ```text
//! DSPREP_SCAN_CHUNK         records read per scanner refill   (default: 65536)
//! DSPREP_WRITE_BUFFER       records buffered before a flush   (default: 4194304)
//! DSPREP_PROGRESS_INTERVAL  records between progress reports  (default: 1048576)
//! DSPREP_STORE_DIR          store directory                   (default: "data")
//! DSPREP_OVERWRITE          replace existing containers       (default: "false")
//! ```

use std::path::PathBuf;

/// Default number of records read per scanner refill.
pub const DEFAULT_SCAN_CHUNK: usize = 1 << 16;

/// Default number of records buffered by the merge output writer.
pub const DEFAULT_WRITE_BUFFER: usize = 1 << 22;

/// Default number of merged records between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1 << 20;

/// Default store directory.
pub const DEFAULT_STORE_DIR: &str = "data";

/// Reads a configuration value from the environment, falling back to `default`
/// when the variable is unset or does not parse.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Settings for the out-of-core merge engine and chunked column transforms.
///
/// Memory held by a cascade merge is bounded by
/// `scan_chunk * scanners + write_buffer` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeConfig {
    /// Records read per scanner refill.
    pub scan_chunk: usize,
    /// Records buffered before the output writer flushes.
    pub write_buffer: usize,
    /// Merged records between progress log lines.
    pub progress_interval: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            scan_chunk: DEFAULT_SCAN_CHUNK,
            write_buffer: DEFAULT_WRITE_BUFFER,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl MergeConfig {
    /// Defaults overridden by `DSPREP_SCAN_CHUNK`, `DSPREP_WRITE_BUFFER` and
    /// `DSPREP_PROGRESS_INTERVAL`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
            .with_scan_chunk(env_parse("DSPREP_SCAN_CHUNK", DEFAULT_SCAN_CHUNK))
            .with_write_buffer(env_parse("DSPREP_WRITE_BUFFER", DEFAULT_WRITE_BUFFER))
            .with_progress_interval(env_parse(
                "DSPREP_PROGRESS_INTERVAL",
                DEFAULT_PROGRESS_INTERVAL,
            ))
    }

    /// Sets the scanner chunk size. Zero is clamped to 1.
    #[must_use]
    pub fn with_scan_chunk(mut self, records: usize) -> Self {
        self.scan_chunk = records.max(1);
        self
    }

    /// Sets the output buffer size. Zero is clamped to 1.
    #[must_use]
    pub fn with_write_buffer(mut self, records: usize) -> Self {
        self.write_buffer = records.max(1);
        self
    }

    /// Sets the progress interval. Zero is clamped to 1.
    #[must_use]
    pub fn with_progress_interval(mut self, records: u64) -> Self {
        self.progress_interval = records.max(1);
        self
    }
}

/// Where the CLI keeps its containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub root: PathBuf,
    /// Whether commands that create containers may replace existing ones.
    pub overwrite: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORE_DIR),
            overwrite: false,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `DSPREP_STORE_DIR` and `DSPREP_OVERWRITE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("DSPREP_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_DIR)),
            overwrite: env_parse("DSPREP_OVERWRITE", false),
        }
    }
}
