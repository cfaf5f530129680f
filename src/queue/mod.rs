//! Bounded FIFO queue primitive. The `Queue` facet that wraps it
//! for subsystem use lives in [`crate::processing::queue_facet`].

mod bounded;

pub use bounded::{BoundedQueue, EnqueueOutcome, OverflowPolicy, QueueItem, QueueStats};
