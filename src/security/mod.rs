//! Principals, PKRs, access control, and identity creation.

mod pkr;
mod principal;
mod registry;
mod rws;

pub use pkr::PKR;
pub use principal::{Principal, PrincipalKind};
pub use registry::{ArcKernelCapability, CreatePrincipalOptions, Identity, KernelCapability, PrincipalRegistry};
pub use rws::ReaderWriterSet;
