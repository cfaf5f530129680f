//! The explicit context struct handed to every facet hook at build time.
//!
//! Replaces a shared-mutable `ctx` object with a value built by the resolver
//! and only mutated by the builder before commit.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::clock::{Clock, IdGen};
use crate::resolver::DependencyGraphCache;

/// Opaque handle to an externally supplied message system. The framework
/// never inspects it; specializations downcast with [`Any`].
pub type ExternalMessageSystem = Arc<dyn Any + Send + Sync>;

/// Built by [`crate::resolver::SubsystemBuilder::plan`] and merged into the
/// owning subsystem on a successful `build`.
#[derive(Clone)]
pub struct BuildContext {
    pub ms: Option<ExternalMessageSystem>,
    pub config: Value,
    pub debug: bool,
    pub clock: Arc<dyn Clock>,
    pub id_gen: Arc<dyn IdGen>,
    pub graph_cache: Arc<DependencyGraphCache>,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("ms", &self.ms.is_some())
            .field("config", &self.config)
            .field("debug", &self.debug)
            .finish()
    }
}

impl BuildContext {
    pub fn new(
        ms: Option<ExternalMessageSystem>,
        config: Value,
        debug: bool,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
        graph_cache: Arc<DependencyGraphCache>,
    ) -> Self {
        Self {
            ms,
            config,
            debug,
            clock,
            id_gen,
            graph_cache,
        }
    }
}
