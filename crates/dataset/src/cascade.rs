//! Out-of-core multiway merge of persisted datasets.
//!
//! ```text
//!   input 0 ──> MergeScanner(idx 0) ─┐
//!   input 1 ──> MergeScanner(idx 1) ─┤                      ┌──────────────┐
//!     ...                            ├─> min-heap by ──────>│ OutputWriter │──> target container
//!   input 0 ──> MergeScanner(idx n)  │   (head_ts, idx)     │  (buffered)  │     (pre-sized)
//!    (twin: shift +Δ, negate)       ─┘                      └──────────────┘
//! ```
//!
//! Each scanner holds one chunk of its input in memory. The driver pops the
//! scanner with the smallest `(head_ts, index)`, moves the run of records
//! sharing that timestamp from the scanner's chunk into the output buffer,
//! and pushes the scanner back while it has data. Memory is bounded by
//! `scan_chunk * scanners + write_buffer` records.
//!
//! Ties across scanners go to the lower index: inputs in the order given,
//! then the twins in the same order. A scanner whose run reaches the end of
//! its chunk refills and is pushed back with the same key, so it keeps
//! priority over higher-indexed scanners at that timestamp.

use config::MergeConfig;
use record::Record;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use store::{Container, Store};
use tracing::{debug, info};

use crate::persisted::decorate;
use crate::{Error, Result, StreamDataset};

/// Reads a container front to back, one chunk at a time.
struct SeqScanner {
    container: Container,
    chunk: usize,
    /// Index of the next record to read from the container.
    next: u64,
    buf: Vec<Record>,
    /// Position of the first unconsumed record in `buf`.
    cursor: usize,
}

impl SeqScanner {
    fn new(container: Container, chunk: usize) -> Self {
        Self {
            container,
            chunk: chunk.max(1),
            next: 0,
            buf: Vec::new(),
            cursor: 0,
        }
    }

    fn len(&self) -> u64 {
        self.container.len()
    }

    /// Replaces the buffer with the next chunk. Returns `false` once the
    /// container is exhausted, leaving the buffer empty.
    fn refill(&mut self) -> Result<bool> {
        self.cursor = 0;
        let len = self.container.len();
        if self.next >= len {
            self.buf.clear();
            return Ok(false);
        }
        let n = (self.chunk as u64).min(len - self.next) as usize;
        self.container.read_into(self.next, n, &mut self.buf)?;
        debug!(
            "Read records {}..{} of '{}'",
            self.next,
            self.next + n as u64,
            self.container.name()
        );
        self.next += n as u64;
        Ok(true)
    }

    fn remaining(&self) -> &[Record] {
        &self.buf[self.cursor..]
    }
}

/// A scanner taking part in the merge, optionally producing the closing twin
/// of its input instead of the input itself.
struct MergeScanner {
    scan: SeqScanner,
    /// Window width when this scanner yields twins.
    twin: Option<i32>,
}

impl MergeScanner {
    fn new(container: Container, chunk: usize, twin: Option<i32>) -> Self {
        Self {
            scan: SeqScanner::new(container, chunk),
            twin,
        }
    }

    fn refill(&mut self) -> Result<bool> {
        let more = self.scan.refill()?;
        if let Some(delta) = self.twin {
            for r in &mut self.scan.buf {
                *r = r.closing_twin(delta);
            }
        }
        Ok(more)
    }

    fn head_ts(&self) -> Option<i32> {
        self.scan.remaining().first().map(|r| r.timestamp)
    }

    /// Moves the run of records sharing the head timestamp into `out`.
    ///
    /// The run stops at the end of the buffered chunk; the next chunk is then
    /// loaded so `head_ts` stays valid.
    fn block_move(&mut self, out: &mut OutputWriter) -> Result<()> {
        let rest = self.scan.remaining();
        let Some(first) = rest.first() else {
            return Ok(());
        };
        let ts = first.timestamp;
        let run = rest.partition_point(|r| r.timestamp <= ts);
        out.write(&rest[..run])?;
        self.scan.cursor += run;
        if self.scan.remaining().is_empty() {
            self.refill()?;
        }
        Ok(())
    }
}

/// A scanner waiting in the merge heap.
struct HeapEntry {
    ts: i32,
    /// Index into the scanner list; also the tie-break.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ts == other.ts && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse both keys so the smallest
        // timestamp, then the lowest index, is popped first.
        other
            .ts
            .cmp(&self.ts)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Buffers merged records in front of a pre-sized container.
struct OutputWriter {
    container: Container,
    buf: Vec<Record>,
    capacity: usize,
    /// Records already written to the container.
    flushed: u64,
}

impl OutputWriter {
    fn new(container: Container, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let initial = (container.len() as usize).min(capacity);
        Self {
            container,
            buf: Vec::with_capacity(initial),
            capacity,
            flushed: 0,
        }
    }

    fn write(&mut self, records: &[Record]) -> Result<()> {
        if self.buf.len() + records.len() > self.capacity {
            self.flush()?;
        }
        if records.len() >= self.capacity {
            self.container.write(self.flushed, records)?;
            self.flushed += records.len() as u64;
        } else {
            self.buf.extend_from_slice(records);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.container.write(self.flushed, &self.buf)?;
        self.flushed += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }

    fn written(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    fn finish(mut self) -> Result<(Container, u64)> {
        self.flush()?;
        self.container.sync()?;
        Ok((self.container, self.flushed))
    }
}

/// [`cascade_merge_with`] using [`MergeConfig::default`].
pub fn cascade_merge(
    store: &Store,
    name: &str,
    inputs: &[&StreamDataset],
    window: Option<i32>,
    overwrite: bool,
) -> Result<StreamDataset> {
    cascade_merge_with(store, name, inputs, window, overwrite, &MergeConfig::default())
}

/// Merges `inputs` by timestamp into a new dataset `name`.
///
/// With `window = Some(delta)`, every input also contributes its closing
/// twin (timestamps shifted by `delta`, update counts negated), computed
/// chunk by chunk while scanning and never written to disk.
///
/// The target is created with its final length before any record is merged
/// and decorated only after every record is written. If this returns an
/// error, the target may exist without its reserved attributes and must be
/// discarded.
///
/// # Errors
///
/// * [`Error::NameConflict`] if `name` exists and `overwrite` is false, or if
///   `name` is one of the inputs.
/// * [`Error::CountMismatch`] if the merge wrote a different number of
///   records than the inputs hold.
/// * Any store error raised while reading or writing.
pub fn cascade_merge_with(
    store: &Store,
    name: &str,
    inputs: &[&StreamDataset],
    window: Option<i32>,
    overwrite: bool,
    config: &MergeConfig,
) -> Result<StreamDataset> {
    if inputs
        .iter()
        .any(|ds| store.data_path(name) == ds.container().data_path())
    {
        return Err(Error::NameConflict(name.to_string()));
    }

    let mut scanners = Vec::with_capacity(inputs.len() * 2);
    for ds in inputs {
        scanners.push(MergeScanner::new(ds.reader()?, config.scan_chunk, None));
    }
    if let Some(delta) = window {
        for ds in inputs {
            scanners.push(MergeScanner::new(ds.reader()?, config.scan_chunk, Some(delta)));
        }
    }
    let total: u64 = scanners.iter().map(|s| s.scan.len()).sum();

    info!(
        "Merging {} dataset(s) into '{}' ({} records, window {:?})",
        inputs.len(),
        name,
        total,
        window
    );
    for ds in inputs {
        info!("  input '{}': {}", ds.name(), ds.metadata());
    }

    let target = store.create(name, total, overwrite)?;
    let mut writer = OutputWriter::new(target, config.write_buffer);

    let mut heap = BinaryHeap::with_capacity(scanners.len());
    for (source, scanner) in scanners.iter_mut().enumerate() {
        if scanner.refill()? {
            if let Some(ts) = scanner.head_ts() {
                heap.push(HeapEntry { ts, source });
            }
        }
    }

    let interval = config.progress_interval.max(1);
    let mut next_report = interval;
    while let Some(top) = heap.pop() {
        let scanner = &mut scanners[top.source];
        scanner.block_move(&mut writer)?;
        if let Some(ts) = scanner.head_ts() {
            heap.push(HeapEntry {
                ts,
                source: top.source,
            });
        }

        let written = writer.written();
        if written >= next_report {
            info!(
                "Merged {} of {} records ({:.1} %)",
                written,
                total,
                written as f64 * 100.0 / total as f64
            );
            while next_report <= written {
                next_report += interval;
            }
        }
    }

    let (mut container, written) = writer.finish()?;
    if written != total {
        return Err(Error::CountMismatch {
            expected: total,
            actual: written,
        });
    }
    info!("Merged {} records into '{}'", written, name);

    let metadata = decorate(&mut container, config.scan_chunk)?;
    info!("Decorated '{}': {}", name, metadata);
    Ok(StreamDataset::from_container(container)?.with_scan_chunk(config.scan_chunk))
}
