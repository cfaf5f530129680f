//! Named route registry built atop [`crate::path::PathMatcher`].

mod route;

pub use route::{Route, RouteHandler, RouteOptions};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Result, SubsystemError};
use crate::message::Message;
use crate::path::{MatchOutcome, PathMatcher};

/// Registration handle returned by [`Router::register_route`]; also the key
/// used by `unregister_route`.
pub type RouteHandle = String;

struct State {
    routes: HashMap<String, Route>,
}

/// The Router facet. Each `register_route` call is atomic with respect to
/// `match`/`route` because the crate is single-threaded per subsystem, but
/// the lock still protects against accidental concurrent external access.
pub struct Router {
    state: RwLock<State>,
    sequence: AtomicU64,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                routes: HashMap::new(),
            }),
            sequence: AtomicU64::new(0),
        }
    }

    /// Compiles `pattern` and registers `handler`. Rejects a duplicate
    /// `pattern` unless `options.overwrite` is set.
    pub fn register_route(
        &self,
        pattern: &str,
        handler: RouteHandler,
        options: RouteOptions,
    ) -> Result<RouteHandle> {
        let matcher = PathMatcher::compile(pattern)?;
        let mut state = self.state.write();
        if state.routes.contains_key(pattern) && !options.overwrite {
            return Err(SubsystemError::InvalidArgument(format!(
                "route `{pattern}` already registered"
            )));
        }
        let registered_at = self.sequence.fetch_add(1, Ordering::SeqCst);
        state.routes.insert(
            pattern.to_string(),
            Route {
                matcher,
                handler,
                priority: options.priority,
                description: options.description,
                metadata: options.metadata,
                registered_at,
            },
        );
        Ok(pattern.to_string())
    }

    pub fn unregister_route(&self, pattern: &str) -> bool {
        self.state.write().routes.remove(pattern).is_some()
    }

    pub fn has_route(&self, pattern: &str) -> bool {
        self.state.read().routes.contains_key(pattern)
    }

    pub fn get_routes(&self) -> Vec<(String, Route)> {
        self.state
            .read()
            .routes
            .iter()
            .map(|(p, r)| (p.clone(), r.clone()))
            .collect()
    }

    /// Best match ordering: higher priority wins; ties broken by
    /// specificity, then by earlier registration.
    pub fn match_path(&self, path: &str) -> Option<(Route, MatchOutcome)> {
        let state = self.state.read();
        state
            .routes
            .values()
            .filter_map(|route| route.matcher.matches(path).map(|outcome| (route, outcome)))
            .max_by_key(|(route, _)| route.ordering_key())
            .map(|(route, outcome)| (route.clone(), outcome))
    }

    /// Matches `message.path`, then invokes the winning handler. Fails with
    /// [`SubsystemError::NoRoute`] when nothing matches.
    pub async fn route(&self, message: &Message, opts: &Value) -> Result<Value> {
        let (route, params) = self.match_path(&message.path).ok_or_else(|| SubsystemError::NoRoute {
            path: message.path.clone(),
        })?;
        (route.handler)(message, &params, opts).await
    }
}
