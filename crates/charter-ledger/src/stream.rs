use std::collections::VecDeque;

use charter_types::Event;

use crate::error::LedgerResult;
use crate::traits::LedgerReader;

/// Lazy, batched iterator over valid events in sequence order.
///
/// The upper bound is fixed when the stream is created; later appends are
/// not observed. Each pull that drains the buffer reads one batch of
/// `batch_size` sequences. Dropping the stream early has no side effects.
pub struct EventStream<'a, R: LedgerReader + ?Sized> {
    reader: &'a R,
    next_sequence: u64,
    end: u64,
    batch_size: u64,
    buffer: VecDeque<Event>,
    exhausted: bool,
    failed: bool,
}

impl<'a, R: LedgerReader + ?Sized> EventStream<'a, R> {
    pub fn new(reader: &'a R, batch_size: usize) -> LedgerResult<Self> {
        let end = reader.get_max_sequence()?;
        Ok(Self {
            reader,
            next_sequence: 1,
            end,
            batch_size: batch_size.max(1) as u64,
            buffer: VecDeque::new(),
            exhausted: end == 0,
            failed: false,
        })
    }

    /// Upper sequence bound captured at creation.
    pub fn end(&self) -> u64 {
        self.end
    }

    fn fill(&mut self) -> LedgerResult<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let batch_end = self
                .next_sequence
                .saturating_add(self.batch_size - 1)
                .min(self.end);
            let batch = self.reader.read_events(self.next_sequence, batch_end)?;
            tracing::trace!(
                start = self.next_sequence,
                end = batch_end,
                count = batch.len(),
                "stream batch read"
            );
            self.buffer.extend(batch);
            if batch_end >= self.end {
                self.exhausted = true;
            } else {
                self.next_sequence = batch_end + 1;
            }
        }
        Ok(())
    }
}

impl<R: LedgerReader + ?Sized> Iterator for EventStream<'_, R> {
    type Item = LedgerResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(err) = self.fill() {
            self.failed = true;
            return Some(Err(err));
        }
        self.buffer.pop_front().map(Ok)
    }
}
