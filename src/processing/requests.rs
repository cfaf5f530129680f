//! Outgoing requests with correlation id and timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::clock::{Clock, IdGen};
use crate::error::{Result, SubsystemError};
use crate::message::Message;

use super::message_processor::{DispatchOptions, MessageProcessor};

/// The Requests facet: allocates a correlation id per outgoing request and
/// suspends the caller until a matching response arrives or the deadline
/// passes.
pub struct Requests {
    processor: Arc<MessageProcessor>,
    id_gen: Arc<dyn IdGen>,
    clock: Arc<dyn Clock>,
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
}

impl Requests {
    pub fn new(processor: Arc<MessageProcessor>, id_gen: Arc<dyn IdGen>, clock: Arc<dyn Clock>) -> Self {
        Self {
            processor,
            id_gen,
            clock,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Dispatches `msg` and waits for a correlated response, up to
    /// `timeout`. On expiry the pending slot is reclaimed and
    /// [`SubsystemError::Timeout`] is raised with `elapsed_ms` measured
    /// against `self.clock` rather than echoed back from `timeout`, so the
    /// error reflects what the clock collaborator actually observed; a
    /// response that arrives after that point finds no slot and is silently
    /// dropped.
    pub async fn ask(&self, msg: Message, timeout: Duration) -> Result<Value> {
        let correlation_id = self.id_gen.new_uuid_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(correlation_id.clone(), tx);

        let dispatched = msg.with_correlation_id(correlation_id.clone());
        self.processor
            .accept(dispatched, DispatchOptions::default())
            .await?;

        let started = self.clock.now();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) | Err(_) => {
                self.pending.lock().remove(&correlation_id);
                let elapsed_ms = self.clock.now().duration_since(started).as_millis() as u64;
                Err(SubsystemError::Timeout { correlation_id, elapsed_ms })
            }
        }
    }

    /// Delivers a response to the pending request matching `correlation_id`.
    /// Returns `false` if no such request is outstanding (already timed out
    /// or unknown id).
    pub fn respond(&self, correlation_id: &str, value: Value) -> bool {
        match self.pending.lock().remove(correlation_id) {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, RandomIdGen, SystemClock};
    use crate::message::MessageOptions;
    use crate::router::Router;

    fn requests() -> Requests {
        requests_with_clock(Arc::new(SystemClock))
    }

    fn requests_with_clock(clock: Arc<dyn Clock>) -> Requests {
        let router = Arc::new(Router::new());
        let processor = Arc::new(MessageProcessor::new(
            router,
            None,
            None,
            None,
            true,
            clock.clone(),
        ));
        Requests::new(processor, Arc::new(RandomIdGen), clock)
    }

    // start_paused lets the runtime jump its virtual clock straight to the
    // pending timer instead of actually sleeping 20ms of wall time.
    #[tokio::test(start_paused = true)]
    async fn ask_times_out_without_a_response() {
        let reqs = requests();
        let gen = RandomIdGen;
        let msg = Message::new("whatever", Value::Null, MessageOptions::default(), &gen);
        let err = reqs.ask(msg, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, SubsystemError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn ask_reports_elapsed_from_injected_clock() {
        let clock = Arc::new(FixedClock::new());
        let reqs = requests_with_clock(clock.clone());
        let gen = RandomIdGen;
        let msg = Message::new("whatever", Value::Null, MessageOptions::default(), &gen);

        let advancer = {
            let clock = clock.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                clock.advance(7);
            }
        };
        let (result, _) = tokio::join!(reqs.ask(msg, Duration::from_millis(10)), advancer);
        match result.unwrap_err() {
            SubsystemError::Timeout { elapsed_ms, .. } => assert_eq!(elapsed_ms, 7),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn respond_to_unknown_correlation_id_returns_false() {
        let reqs = requests();
        assert!(!reqs.respond("missing", Value::Null));
    }
}
