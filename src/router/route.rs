//! A single registered route: compiled pattern, handler, and metadata.

use serde_json::Value;

use crate::future::BoxFuture;
use crate::message::Message;
use crate::path::{MatchOutcome, PathMatcher};

/// A route's dispatch handler. Takes the message, its captured params, and
/// the per-call dispatch options; returns the handler's result value.
pub type RouteHandler = std::sync::Arc<
    dyn Fn(&Message, &MatchOutcome, &Value) -> BoxFuture<'static, crate::error::Result<Value>>
        + Send
        + Sync,
>;

/// `{priority, description, metadata}`.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    pub priority: i32,
    pub description: Option<String>,
    pub metadata: Value,
    pub overwrite: bool,
}

/// `{ pattern, compiled, handler, metadata }`.
#[derive(Clone)]
pub struct Route {
    pub matcher: PathMatcher,
    pub handler: RouteHandler,
    pub priority: i32,
    pub description: Option<String>,
    pub metadata: Value,
    /// Registration sequence number; breaks ties among equal priority and
    /// specificity in favor of the earlier registration.
    pub(crate) registered_at: u64,
}

impl Route {
    /// Ordering key for match resolution: higher priority first, then more
    /// specific (more literals, fewer wildcards), then earlier registration.
    pub(crate) fn ordering_key(&self) -> (i32, usize, usize, std::cmp::Reverse<u64>) {
        let (literals, non_wildcards) = self.matcher.specificity();
        (
            self.priority,
            literals,
            non_wildcards,
            std::cmp::Reverse(self.registered_at),
        )
    }
}
