//! Hook descriptors and the facet runtime record they produce.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::context::BuildContext;
use crate::error::Result;
use crate::future::BoxFuture;

use super::contract::FacetContract;

/// Identifies a capability. The well-known kinds are typed variants for hot
/// paths; `Custom` is the open extension channel for user-defined facets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Router,
    Queue,
    Statistics,
    MessageProcessor,
    Scheduler,
    Synchronous,
    Queries,
    Requests,
    Listeners,
    Custom(String),
}

/// A facet's public surface, type-erased so the manager can store
/// heterogeneous facets behind one map. Concrete facets recover their
/// typed form via `Arc<dyn Any + Send + Sync>::downcast`.
pub type FacetApi = dyn Any + Send + Sync;

/// An init or dispose lifecycle callback. Boxed to allow async work (I/O,
/// other facets) during install/teardown.
pub type LifecycleCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// The instantiated capability the builder installs into the
/// [`crate::facet::manager::FacetManager`].
#[derive(Clone)]
pub struct FacetRecord {
    pub kind: FacetKind,
    pub api: Arc<FacetApi>,
    pub on_init: Vec<LifecycleCallback>,
    pub on_dispose: Vec<LifecycleCallback>,
    pub attached: bool,
    /// Methods/properties this facet instance claims to expose, checked
    /// against a [`FacetContract`] at plan time. Empty for well-known,
    /// compile-time-typed facets, which never go through contract
    /// enforcement in the first place.
    pub provides_methods: HashSet<String>,
    pub provides_properties: HashSet<String>,
}

impl FacetRecord {
    pub fn new(kind: FacetKind, api: Arc<FacetApi>) -> Self {
        Self {
            kind,
            api,
            on_init: Vec::new(),
            on_dispose: Vec::new(),
            attached: false,
            provides_methods: HashSet::new(),
            provides_properties: HashSet::new(),
        }
    }

    pub fn with_init(mut self, cb: LifecycleCallback) -> Self {
        self.on_init.push(cb);
        self
    }

    pub fn with_dispose(mut self, cb: LifecycleCallback) -> Self {
        self.on_dispose.push(cb);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>) -> Self {
        self.provides_methods.insert(name.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>) -> Self {
        self.provides_properties.insert(name.into());
        self
    }
}

impl fmt::Debug for FacetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetRecord")
            .field("kind", &self.kind)
            .field("on_init_len", &self.on_init.len())
            .field("on_dispose_len", &self.on_dispose.len())
            .field("attached", &self.attached)
            .finish()
    }
}

/// Read-only view of the facets instantiated so far in the current plan,
/// handed to later hooks so they can look up an earlier-installed sibling
/// (e.g. the Queue facet wiring its `full` event to Statistics).
pub struct PartialFacets<'a> {
    by_kind: &'a HashMap<FacetKind, FacetRecord>,
}

impl<'a> PartialFacets<'a> {
    pub fn new(by_kind: &'a HashMap<FacetKind, FacetRecord>) -> Self {
        Self { by_kind }
    }

    pub fn get(&self, kind: &FacetKind) -> Option<&FacetRecord> {
        self.by_kind.get(kind)
    }
}

/// Produces a [`FacetRecord`] given the resolved build context and the
/// facets installed earlier in plan order.
pub type BuildFn =
    Arc<dyn Fn(&BuildContext, &PartialFacets<'_>) -> Result<FacetRecord> + Send + Sync>;

/// `{ kind, required, overwrite, attach, source, fn }`.
///
/// Invariants: `required` contains no duplicates and never contains `kind`
/// itself (checked by [`crate::resolver::DependencyResolver`]).
#[derive(Clone)]
pub struct HookDescriptor {
    pub kind: FacetKind,
    pub required: Vec<FacetKind>,
    pub overwrite: bool,
    pub attach: bool,
    pub source: String,
    pub build: BuildFn,
    /// Contract the built facet must satisfy, checked once at plan time,
    /// before any facet's `on_init` runs. `None` for hooks that don't need
    /// one, which is every well-known kind: their shape is already pinned
    /// by the Rust type system.
    pub contract: Option<Arc<FacetContract>>,
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("overwrite", &self.overwrite)
            .field("attach", &self.attach)
            .field("source", &self.source)
            .field("has_contract", &self.contract.is_some())
            .finish()
    }
}
