//! Streaming sliding window.

use record::Record;
use std::collections::VecDeque;
use std::iter::Peekable;

/// Yields every record of a timestamp-sorted iterator plus, `delta` time
/// units later, its closing twin.
///
/// This is the streaming counterpart of
/// [`StreamArray::time_window`](crate::StreamArray::time_window) and produces
/// the same sequence: on a timestamp tie the original record comes before a
/// pending twin. Pending twins wait in a FIFO, so memory is bounded by the
/// number of records inside one window.
///
/// ```rust
/// use dataset::{Record, TimeWindowIter};
///
/// let input = vec![Record::new(0, 0, 1, 1, 0), Record::new(0, 0, 2, 1, 2)];
/// let ts: Vec<(i32, i32)> = TimeWindowIter::new(input, 2)
///     .map(|r| (r.timestamp, r.update_count))
///     .collect();
/// assert_eq!(ts, vec![(0, 1), (2, 1), (2, -1), (4, -1)]);
/// ```
pub struct TimeWindowIter<I: Iterator<Item = Record>> {
    inner: Peekable<I>,
    delta: i32,
    pending: VecDeque<Record>,
}

impl<I: Iterator<Item = Record>> TimeWindowIter<I> {
    /// # Panics
    ///
    /// Panics if `delta` is negative: twins would have to be emitted before
    /// the record they close.
    pub fn new<T: IntoIterator<IntoIter = I>>(records: T, delta: i32) -> Self {
        assert!(delta >= 0, "window width must not be negative, got {}", delta);
        Self {
            inner: records.into_iter().peekable(),
            delta,
            pending: VecDeque::new(),
        }
    }

    /// Number of twins waiting to be emitted.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn take_original(&mut self) -> Option<Record> {
        let rec = self.inner.next()?;
        self.pending.push_back(rec.closing_twin(self.delta));
        Some(rec)
    }
}

impl<I: Iterator<Item = Record>> Iterator for TimeWindowIter<I> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let twin_first = match (self.inner.peek(), self.pending.front()) {
            (Some(rec), Some(twin)) => rec.timestamp > twin.timestamp,
            (Some(_), None) => false,
            (None, _) => true,
        };
        if twin_first {
            self.pending.pop_front()
        } else {
            self.take_original()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        let queued = self.pending.len();
        (
            lo.saturating_mul(2).saturating_add(queued),
            hi.and_then(|h| h.checked_mul(2)?.checked_add(queued)),
        )
    }
}
