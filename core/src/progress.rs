use std::sync::atomic::{AtomicU32, Ordering};

/// Cooperative cancellation flag shared between the caller and a running analysis.
///
/// Analyses poll `is_cancelled()` synchronously from their worker thread.
pub use tokio_util::sync::CancellationToken;

/// Receives completion percentages (0..=100) from a running analysis.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u32);
}

impl ProgressSink for () {
    fn report(&self, _percent: u32) {}
}

impl<F> ProgressSink for F
where
    F: Fn(u32) + Send + Sync,
{
    fn report(&self, percent: u32) {
        self(percent)
    }
}

/// Two-level progress for consistency checks: entries of the batch, and
/// source-loop iterations within the current entry.
pub trait ConsistencyProgress: Send + Sync {
    fn entries(&self, percent: u32);
    fn iterations(&self, percent: u32);
}

impl ConsistencyProgress for () {
    fn entries(&self, _percent: u32) {}
    fn iterations(&self, _percent: u32) {}
}

impl<E, I> ConsistencyProgress for (E, I)
where
    E: ProgressSink,
    I: ProgressSink,
{
    fn entries(&self, percent: u32) {
        self.0.report(percent)
    }

    fn iterations(&self, percent: u32) {
        self.1.report(percent)
    }
}

/// Drops reports that advance less than `step` percent since the last one
/// forwarded. 0 and 100 are always forwarded.
pub struct Throttled<'a, P: ?Sized> {
    inner: &'a P,
    step: u32,
    last: AtomicU32,
}

impl<'a, P: ProgressSink + ?Sized> Throttled<'a, P> {
    pub fn new(inner: &'a P, step: u32) -> Self {
        Self {
            inner,
            step: step.max(1),
            last: AtomicU32::new(u32::MAX),
        }
    }
}

impl<P: ProgressSink + ?Sized> ProgressSink for Throttled<'_, P> {
    fn report(&self, percent: u32) {
        let last = self.last.load(Ordering::Relaxed);
        let due = last == u32::MAX
            || percent == 0
            || percent >= 100
            || percent.saturating_sub(last) >= self.step
            || percent < last;
        if due {
            self.last.store(percent, Ordering::Relaxed);
            self.inner.report(percent);
        }
    }
}

/// Outcome of an analysis call that ran to the end or was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis<T> {
    Completed(T),
    Cancelled,
}

impl<T> Analysis<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Analysis::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Analysis::Completed(value) => Some(value),
            Analysis::Cancelled => None,
        }
    }
}

/// Integer percentage of `done` out of `total`, 100 when `total` is zero.
pub(crate) fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u32
}
