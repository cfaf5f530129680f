//! Accept / processTick / processImmediately: routes and dispatches
//! messages.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::clock::Clock;
use crate::error::{Result, SubsystemError};
use crate::message::Message;
use crate::queue::{EnqueueOutcome, QueueItem};
use crate::router::Router;
use crate::statistics::Statistics;

use super::queries::Queries;
use super::queue_facet::QueueFacet;

/// Per-call dispatch options. `process_immediately` forces inline dispatch
/// from `accept` even without a Synchronous facet installed.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub process_immediately: bool,
}

/// Result of a successful `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    DispatchedInline,
    Enqueued(EnqueueOutcome),
}

/// `{processed, remaining_budget, queue_size}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    pub processed: usize,
    pub remaining_budget_ms: u64,
    pub queue_size: usize,
}

/// The MessageProcessor facet: the hub that wires Router, Queue, Statistics,
/// and Queries together.
pub struct MessageProcessor {
    router: Arc<Router>,
    queue: Option<Arc<QueueFacet>>,
    statistics: Option<Arc<Statistics>>,
    queries: Option<Arc<Queries>>,
    synchronous_installed: bool,
    clock: Arc<dyn Clock>,
}

impl MessageProcessor {
    pub fn new(
        router: Arc<Router>,
        queue: Option<Arc<QueueFacet>>,
        statistics: Option<Arc<Statistics>>,
        queries: Option<Arc<Queries>>,
        synchronous_installed: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            router,
            queue,
            statistics,
            queries,
            synchronous_installed,
            clock,
        }
    }

    /// Records `messages_accepted`, then either dispatches inline or
    /// delegates to the Queue facet, honoring its overflow policy.
    pub async fn accept(&self, msg: Message, opts: DispatchOptions) -> Result<AcceptOutcome> {
        if msg.path.is_empty() {
            return Err(SubsystemError::invalid_argument("message path must not be empty"));
        }

        if let Some(stats) = &self.statistics {
            stats.record_message_accepted();
        }

        if opts.process_immediately || self.synchronous_installed {
            self.process_immediately(&msg, &opts).await?;
            return Ok(AcceptOutcome::DispatchedInline);
        }

        match &self.queue {
            Some(queue) => {
                let outcome = queue.enqueue(QueueItem {
                    message: msg,
                    options: Value::Null,
                });
                Ok(AcceptOutcome::Enqueued(outcome))
            }
            None => {
                self.process_immediately(&msg, &opts).await?;
                Ok(AcceptOutcome::DispatchedInline)
            }
        }
    }

    /// Routes and invokes the handler, updating `messages_processed` and
    /// `total_processing_time`. A handler error is recorded via
    /// `processing_errors` and still propagated to the caller.
    pub async fn process_immediately(&self, msg: &Message, _opts: &DispatchOptions) -> Result<Value> {
        if msg.path.is_empty() {
            return Err(SubsystemError::invalid_argument("message path must not be empty"));
        }

        let start = self.clock.now();

        let result = if msg.path.starts_with("query/") {
            if let Some(queries) = &self.queries {
                queries.handle(msg).await
            } else {
                self.router.route(msg, &Value::Null).await
            }
        } else {
            self.router.route(msg, &Value::Null).await
        };

        let elapsed_ms = self.clock.now().duration_since(start).as_millis() as u64;

        if let Some(stats) = &self.statistics {
            match &result {
                Ok(_) => stats.record_message_processed(elapsed_ms),
                Err(err) => {
                    stats.record_processing_error();
                    warn!(error = %err, path = %msg.path, "handler raised an error");
                }
            }
        }

        result
    }

    /// Internal dispatch path used by the scheduler: unwraps a queued pair
    /// and processes it like `process_immediately`.
    pub async fn process_message(&self, pair: QueueItem) -> Result<Value> {
        self.process_immediately(&pair.message, &DispatchOptions::default()).await
    }

    /// Drains the queue up to `budget`, dispatching each message in turn.
    pub async fn process_tick(&self, budget: Duration) -> TickResult {
        let Some(queue) = &self.queue else {
            return TickResult {
                processed: 0,
                remaining_budget_ms: budget.as_millis() as u64,
                queue_size: 0,
            };
        };

        let start = self.clock.now();
        let mut processed = 0usize;
        loop {
            let elapsed = self.clock.now().duration_since(start);
            if elapsed >= budget || !queue.has_messages_to_process() {
                break;
            }
            let Some(item) = queue.select_next_message() else {
                break;
            };
            if let Err(err) = self.process_message(item).await {
                warn!(error = %err, "process_tick dispatch failed");
            }
            processed += 1;
        }

        let elapsed = self.clock.now().duration_since(start);
        let remaining = budget.saturating_sub(elapsed).as_millis() as u64;
        TickResult {
            processed,
            remaining_budget_ms: remaining,
            queue_size: queue_size(queue),
        }
    }
}

fn queue_size(queue: &Arc<QueueFacet>) -> usize {
    let status = queue.get_queue_status(&Value::Null);
    status["size"].as_u64().unwrap_or(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RandomIdGen;
    use crate::clock::SystemClock;
    use crate::message::MessageOptions;
    use crate::queue::OverflowPolicy;
    use crate::router::{RouteOptions, Router};

    fn processor_with_route() -> MessageProcessor {
        let router = Arc::new(Router::new());
        router
            .register_route(
                "test/path",
                Arc::new(|_msg, _params, _opts| Box::pin(async { Ok(serde_json::json!({"ok": true})) })),
                RouteOptions::default(),
            )
            .unwrap();
        let stats = Arc::new(Statistics::new());
        MessageProcessor::new(router, None, Some(stats), None, true, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn process_immediately_updates_statistics() {
        let processor = processor_with_route();
        let gen = RandomIdGen;
        let msg = Message::new("test/path", Value::Null, MessageOptions::default(), &gen);
        let result = processor.process_immediately(&msg, &DispatchOptions::default()).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn accept_dispatches_inline_when_synchronous() {
        let processor = processor_with_route();
        let gen = RandomIdGen;
        let msg = Message::new("test/path", Value::Null, MessageOptions::default(), &gen);
        let outcome = processor.accept(msg, DispatchOptions::default()).await.unwrap();
        assert_eq!(outcome, AcceptOutcome::DispatchedInline);
    }

    #[tokio::test]
    async fn accept_rejects_an_empty_path() {
        let processor = processor_with_route();
        let gen = RandomIdGen;
        let msg = Message::new("", Value::Null, MessageOptions::default(), &gen);
        let err = processor.accept(msg, DispatchOptions::default()).await.unwrap_err();
        assert!(matches!(err, crate::error::SubsystemError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn process_immediately_rejects_an_empty_path() {
        let processor = processor_with_route();
        let gen = RandomIdGen;
        let msg = Message::new("", Value::Null, MessageOptions::default(), &gen);
        let err = processor
            .process_immediately(&msg, &DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::SubsystemError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn accept_enqueues_when_not_synchronous() {
        let router = Arc::new(Router::new());
        let queue = Arc::new(QueueFacet::new(4, OverflowPolicy::Reject, None));
        let processor = MessageProcessor::new(router, Some(queue), None, None, false, Arc::new(SystemClock));
        let gen = RandomIdGen;
        let msg = Message::new("x", Value::Null, MessageOptions::default(), &gen);
        let outcome = processor.accept(msg, DispatchOptions::default()).await.unwrap();
        assert!(matches!(outcome, AcceptOutcome::Enqueued(EnqueueOutcome::Accepted)));
    }
}
