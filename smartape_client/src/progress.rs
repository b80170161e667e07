//! Progress reporting shared by the deploy and find workflows

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Workflow stage an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    Deploy,
    Link,
    Read,
    Done,
}

/// One progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Fraction complete, 0.0 to 1.0
    pub fraction: f64,
    pub message: String,
}

impl ProgressEvent {
    /// Whole percent, rounded down
    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// Receives progress events from a running workflow
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // receiver gone means nobody is watching
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

/// Maps a step's local progress into a sub-range of the overall flow and
/// keeps reported fractions non-decreasing.
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    start: f64,
    end: f64,
    last: Mutex<f64>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self::with_range(sink, 0.0, 1.0)
    }

    pub fn with_range(sink: &'a dyn ProgressSink, start: f64, end: f64) -> Self {
        Self {
            sink,
            start,
            end,
            last: Mutex::new(start),
        }
    }

    /// A reporter for `[start, end]` sharing this reporter's sink
    pub fn sub_range(&self, start: f64, end: f64) -> ProgressReporter<'a> {
        ProgressReporter::with_range(self.sink, start, end)
    }

    /// Report `done / total` of this range
    pub fn step(&self, stage: Stage, done: usize, total: usize, message: impl Into<String>) {
        let local = if total == 0 {
            1.0
        } else {
            done.min(total) as f64 / total as f64
        };
        let fraction = if done >= total {
            self.end
        } else {
            self.start + (self.end - self.start) * local
        };
        self.emit(stage, fraction, message.into());
    }

    /// Report an absolute fraction of the whole flow
    pub fn at(&self, stage: Stage, fraction: f64, message: impl Into<String>) {
        self.emit(stage, fraction, message.into());
    }

    fn emit(&self, stage: Stage, fraction: f64, message: String) {
        let mut last = self.last.lock();
        let fraction = fraction.clamp(0.0, 1.0).max(*last);
        *last = fraction;
        self.sink.report(ProgressEvent {
            stage,
            fraction,
            message,
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Keeps every event it receives
    #[derive(Default)]
    pub(crate) struct Recorder(pub(crate) Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().push(event);
        }
    }
}
