//! Counters and derived metrics for a subsystem.

use parking_lot::Mutex;

/// A snapshot of [`Statistics`]'s counters, independent of the live facet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub messages_accepted: u64,
    pub messages_processed: u64,
    pub processing_errors: u64,
    pub queue_full_events: u64,
    pub time_slices_received: u64,
    pub total_processing_time_ms: u64,
}

/// Derived metrics layered on top of [`StatisticsSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingMetrics {
    pub snapshot: StatisticsSnapshot,
    pub average_processing_time_ms: u64,
}

#[derive(Default)]
struct Counters {
    messages_accepted: u64,
    messages_processed: u64,
    processing_errors: u64,
    queue_full_events: u64,
    time_slices_received: u64,
    total_processing_time_ms: u64,
}

/// The Statistics facet. Every counter mutation goes through a dedicated
/// `record_*` method so call sites read as intent, not arithmetic.
#[derive(Default)]
pub struct Statistics {
    counters: Mutex<Counters>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message_accepted(&self) {
        self.counters.lock().messages_accepted += 1;
    }

    pub fn record_message_processed(&self, processing_time_ms: u64) {
        let mut c = self.counters.lock();
        c.messages_processed += 1;
        c.total_processing_time_ms += processing_time_ms;
    }

    pub fn record_processing_error(&self) {
        self.counters.lock().processing_errors += 1;
    }

    pub fn record_queue_full(&self) {
        self.counters.lock().queue_full_events += 1;
    }

    pub fn record_time_slice(&self) {
        self.counters.lock().time_slices_received += 1;
    }

    pub fn get_statistics(&self) -> StatisticsSnapshot {
        let c = self.counters.lock();
        StatisticsSnapshot {
            messages_accepted: c.messages_accepted,
            messages_processed: c.messages_processed,
            processing_errors: c.processing_errors,
            queue_full_events: c.queue_full_events,
            time_slices_received: c.time_slices_received,
            total_processing_time_ms: c.total_processing_time_ms,
        }
    }

    pub fn get_processing_metrics(&self) -> ProcessingMetrics {
        let snapshot = self.get_statistics();
        let average = if snapshot.messages_processed == 0 {
            0
        } else {
            snapshot.total_processing_time_ms / snapshot.messages_processed
        };
        ProcessingMetrics {
            snapshot,
            average_processing_time_ms: average,
        }
    }

    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}
