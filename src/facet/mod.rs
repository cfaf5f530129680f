//! Facet model: kinds, hooks, contracts, and the transactional manager.

mod contract;
mod hook;
mod manager;

pub use contract::{router_contract, scheduler_contract, FacetContract};
pub use hook::{BuildFn, FacetApi, FacetKind, FacetRecord, HookDescriptor, LifecycleCallback, PartialFacets};
pub use manager::FacetManager;
