//! Cooperative time-sliced runner atop the message processor.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::statistics::Statistics;

use super::message_processor::{MessageProcessor, TickResult};

const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(50);

/// Outcome of a single `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Completed(TickResult),
    /// Another `process` call is already in flight; this call is a no-op.
    Busy,
    Paused,
}

/// `{priority, isPaused, isProcessing}`.
pub struct Scheduler {
    processor: Arc<MessageProcessor>,
    statistics: Option<Arc<Statistics>>,
    priority: AtomicI32,
    is_paused: AtomicBool,
    is_processing: AtomicBool,
    time_slice: std::sync::Mutex<Duration>,
}

impl Scheduler {
    pub fn new(processor: Arc<MessageProcessor>, statistics: Option<Arc<Statistics>>) -> Self {
        Self {
            processor,
            statistics,
            priority: AtomicI32::new(0),
            is_paused: AtomicBool::new(false),
            is_processing: AtomicBool::new(false),
            time_slice: std::sync::Mutex::new(DEFAULT_TIME_SLICE),
        }
    }

    /// Drains the queue for up to `time_slice` (or the configured default).
    /// Refuses to overlap itself: a concurrent call returns
    /// [`ProcessStatus::Busy`] immediately with no side effects.
    pub async fn process(&self, time_slice: Option<Duration>) -> ProcessStatus {
        if self.is_paused.load(Ordering::SeqCst) {
            return ProcessStatus::Paused;
        }

        if self
            .is_processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ProcessStatus::Busy;
        }

        let budget = time_slice.unwrap_or_else(|| *self.time_slice.lock().expect("time_slice lock"));
        let result = self.processor.process_tick(budget).await;
        if let Some(stats) = &self.statistics {
            stats.record_time_slice();
        }
        debug!(processed = result.processed, "scheduler tick complete");

        self.is_processing.store(false, Ordering::SeqCst);
        ProcessStatus::Completed(result)
    }

    pub fn pause_processing(&self) {
        self.is_paused.store(true, Ordering::SeqCst);
    }

    pub fn resume_processing(&self) {
        self.is_paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::SeqCst)
    }

    pub fn get_priority(&self) -> i32 {
        self.priority.load(Ordering::SeqCst)
    }

    pub fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::SeqCst);
    }

    pub fn configure_scheduler(&self, time_slice: Duration) {
        *self.time_slice.lock().expect("time_slice lock") = time_slice;
    }

    pub fn get_scheduler(&self) -> Value {
        serde_json::json!({
            "priority": self.get_priority(),
            "isPaused": self.is_paused(),
            "isProcessing": self.is_processing(),
        })
    }
}
