//! Cooperative cancellation and progress reporting for long-running passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag, checked at frame boundaries.
///
/// Clones observe the same flag; cancel from any thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Return `true` once [`CancelToken::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receives progress updates from a pass.
///
/// `total == 0` means the total is unknown. `status` carries human-readable notices.
pub trait ProgressSink {
    /// Report `processed` of `total` units.
    fn report(&mut self, processed: u64, total: u64, status: Option<&str>);
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64, Option<&str>),
{
    fn report(&mut self, processed: u64, total: u64, status: Option<&str>) {
        self(processed, total, status)
    }
}

/// Sink that drops every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _processed: u64, _total: u64, _status: Option<&str>) {}
}

/// Rate limiter in front of a [`ProgressSink`]: forwards every `every`-th unit, the final unit,
/// and every status message.
pub(crate) struct Throttled<'a> {
    sink: &'a mut dyn ProgressSink,
    every: u64,
    total: u64,
    last: Option<u64>,
}

impl<'a> Throttled<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink, every: u64, total: u64) -> Self {
        Self {
            sink,
            every: every.max(1),
            total,
            last: None,
        }
    }

    pub(crate) fn tick(&mut self, processed: u64) {
        let due = processed % self.every == 0 || (self.total > 0 && processed >= self.total);
        if due && self.last != Some(processed) {
            self.last = Some(processed);
            self.sink.report(processed, self.total, None);
        }
    }

    pub(crate) fn notice(&mut self, processed: u64, message: &str) {
        self.sink.report(processed, self.total, Some(message));
    }

    /// Emit `processed` unless it was the last value reported.
    pub(crate) fn finish(&mut self, processed: u64) {
        if self.last != Some(processed) {
            self.last = Some(processed);
            self.sink.report(processed, self.total, None);
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/progress.rs"]
mod tests;
