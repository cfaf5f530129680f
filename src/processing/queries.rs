//! Registers `query/*` and correlates query dispatch.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, SubsystemError};
use crate::future::BoxFuture;
use crate::message::Message;
use crate::router::{RouteHandler, RouteOptions, Router};

pub const QUERY_ROUTE_PATTERN: &str = "query/*";
pub const QUERY_ROUTE_PRIORITY: i32 = 10;
pub const QUERY_ROUTE_DESCRIPTION: &str = "Query operations";

/// A registered query handler; processes any message under `query/*`.
pub trait QueryHandler: Send + Sync {
    fn process_query(&self, msg: &Message) -> BoxFuture<'_, Result<Value>>;
}

/// The Queries facet.
pub struct Queries {
    router: Arc<Router>,
    handler: Mutex<Option<Arc<dyn QueryHandler>>>,
}

impl Queries {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            handler: Mutex::new(None),
        }
    }

    /// Idempotent: a second call while a handler is already enabled returns
    /// `true` without replacing it.
    pub fn enable_query_handler(&self, handler: Arc<dyn QueryHandler>) -> Result<bool> {
        let mut guard = self.handler.lock();
        if guard.is_some() {
            return Ok(true);
        }

        let route_handler: RouteHandler = {
            let handler = handler.clone();
            Arc::new(move |msg: &Message, _params, _opts: &Value| {
                let handler = handler.clone();
                let msg = msg.clone();
                Box::pin(async move { handler.process_query(&msg).await }) as BoxFuture<'static, Result<Value>>
            })
        };

        self.router.register_route(
            QUERY_ROUTE_PATTERN,
            route_handler,
            RouteOptions {
                priority: QUERY_ROUTE_PRIORITY,
                description: Some(QUERY_ROUTE_DESCRIPTION.to_string()),
                metadata: Value::Null,
                overwrite: false,
            },
        )?;

        *guard = Some(handler);
        Ok(false)
    }

    /// Returns whether a handler was previously enabled.
    pub fn disable_query_handler(&self) -> bool {
        let mut guard = self.handler.lock();
        let had_handler = guard.take().is_some();
        if had_handler {
            self.router.unregister_route(QUERY_ROUTE_PATTERN);
        }
        had_handler
    }

    /// Short-circuits routing: invokes the enabled handler directly instead
    /// of going through `Router::route`'s full match resolution.
    pub async fn handle(&self, msg: &Message) -> Result<Value> {
        let handler = self
            .handler
            .lock()
            .clone()
            .ok_or_else(|| SubsystemError::NoRoute {
                path: msg.path.clone(),
            })?;
        handler.process_query(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RandomIdGen;
    use crate::message::MessageOptions;

    struct EchoHandler;
    impl QueryHandler for EchoHandler {
        fn process_query(&self, msg: &Message) -> BoxFuture<'_, Result<Value>> {
            let path = msg.path.clone();
            Box::pin(async move { Ok(Value::String(path)) })
        }
    }

    #[test]
    fn enable_is_idempotent() {
        let router = Arc::new(Router::new());
        let queries = Queries::new(router);
        assert_eq!(queries.enable_query_handler(Arc::new(EchoHandler)).unwrap(), false);
        assert_eq!(queries.enable_query_handler(Arc::new(EchoHandler)).unwrap(), true);
    }

    #[tokio::test]
    async fn handle_invokes_enabled_handler() {
        let router = Arc::new(Router::new());
        let queries = Queries::new(router);
        queries.enable_query_handler(Arc::new(EchoHandler)).unwrap();
        let gen = RandomIdGen;
        let msg = Message::new("query/ping", Value::Null, MessageOptions::default(), &gen);
        let result = queries.handle(&msg).await.unwrap();
        assert_eq!(result, Value::String("query/ping".to_string()));
    }

    #[test]
    fn disable_reports_whether_a_handler_was_enabled() {
        let router = Arc::new(Router::new());
        let queries = Queries::new(router);
        assert!(!queries.disable_query_handler());
        queries.enable_query_handler(Arc::new(EchoHandler)).unwrap();
        assert!(queries.disable_query_handler());
    }
}
