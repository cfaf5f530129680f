//! Alternative driver: immediate-dispatch, never enqueues.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::message::Message;

use super::message_processor::{DispatchOptions, MessageProcessor};

/// The Synchronous facet. Its presence on a subsystem is itself the signal
/// [`MessageProcessor::accept`] checks to decide whether to dispatch inline.
pub struct Synchronous {
    processor: Arc<MessageProcessor>,
}

impl Synchronous {
    pub fn new(processor: Arc<MessageProcessor>) -> Self {
        Self { processor }
    }

    /// Forces `meta.process_immediately`, preserving every other meta field,
    /// then dispatches inline.
    pub async fn accept(&self, msg: &Message) -> Result<Value> {
        let forced = msg.with_process_immediately();
        self.processor
            .process_immediately(&forced, &DispatchOptions::default())
            .await
    }

    /// The Synchronous driver has no time-sliced loop to run.
    pub fn process(&self) -> Option<()> {
        None
    }
}
