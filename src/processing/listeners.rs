//! Pub/sub over message paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::future::BoxFuture;
use crate::message::Message;
use crate::path::PathMatcher;

pub type ListenerId = u64;
pub type ListenerHandler = Arc<dyn Fn(&Message) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct Subscription {
    matcher: PathMatcher,
    handler: ListenerHandler,
}

/// The Listeners facet. Delivery order across matching subscriptions is
/// unspecified; each subscription fires at most once per `emit`.
pub struct Listeners {
    subscriptions: Mutex<HashMap<ListenerId, Subscription>>,
    next_id: AtomicU64,
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn on(&self, pattern: &str, handler: ListenerHandler) -> Result<ListenerId> {
        let matcher = PathMatcher::compile(pattern)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions
            .lock()
            .insert(id, Subscription { matcher, handler });
        Ok(id)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.subscriptions.lock().remove(&id).is_some()
    }

    /// Invokes every subscription whose pattern matches `msg.path`. A
    /// handler error is logged and does not prevent other subscriptions
    /// from firing.
    pub async fn emit(&self, msg: &Message) {
        let matching: Vec<ListenerHandler> = {
            let subs = self.subscriptions.lock();
            subs.values()
                .filter(|s| s.matcher.matches(&msg.path).is_some())
                .map(|s| s.handler.clone())
                .collect()
        };

        for handler in matching {
            if let Err(err) = handler(msg).await {
                warn!(error = %err, path = %msg.path, "listener handler failed");
            }
        }
    }
}
