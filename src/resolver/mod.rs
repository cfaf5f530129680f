//! Dependency resolution, plan caching, and transactional installation.

mod cache;
mod dependency;
mod plan;

pub use cache::DependencyGraphCache;
pub use dependency::{fingerprint, DependencyResolver};
pub use plan::{Plan, SubsystemBuilder};
