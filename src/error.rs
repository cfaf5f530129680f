//! Error taxonomy for the whole crate.
//!
//! Every fallible surface returns [`SubsystemError`] (or a type alias of
//! `Result<T, SubsystemError>`). Callers match on the variant, never on the
//! rendered message; the `Display` text is advisory, for logs and humans.

use std::fmt;

use crate::facet::FacetKind;

/// Stable, matchable error domain for the crate. One variant per distinct
/// failure mode; each carries the structured context a caller needs to react
/// without string-matching.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SubsystemError {
    /// Constructor or API-level argument validation failure.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A facet failed its [`crate::facet::FacetContract`] at install time.
    #[error("contract `{contract}` violated: {reason}")]
    ContractViolation { contract: String, reason: String },

    /// Route pattern compilation failed.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// No route matched a dispatched path.
    #[error("no route matches `{path}`")]
    NoRoute { path: String },

    /// Message dispatch attempted without the required core facet installed.
    #[error("required facet `{0}` is not installed")]
    CoreMissing(FacetKind),

    /// `SubsystemBuilder::build` was invoked with a malformed plan.
    #[error("invalid build plan: {0}")]
    InvalidPlan(String),

    /// The dependency resolver found a cycle among hook kinds.
    #[error("unresolvable dependency cycle: {0:?}")]
    UnresolvableDependencies(Vec<FacetKind>),

    /// A hook declared a dependency that no registered hook provides.
    #[error("hook `{from}` requires missing kind `{missing}`")]
    MissingDependency { from: FacetKind, missing: FacetKind },

    /// Two hooks declare the same kind and neither wins by `overwrite`.
    #[error("kind `{0}` is declared by more than one hook without a winning overwrite")]
    AmbiguousHook(FacetKind),

    /// Build attempted on a subsystem that is already built.
    #[error("subsystem `{0}` is already built")]
    AlreadyBuilt(String),

    /// An operation required a built subsystem but it was not built.
    #[error("subsystem `{0}` has not been built")]
    NotBuilt(String),

    /// `Requests::ask` exceeded its deadline before a response arrived.
    #[error("request `{correlation_id}` timed out after {elapsed_ms}ms")]
    Timeout {
        correlation_id: String,
        elapsed_ms: u64,
    },

    /// A PKR argument lacked a usable identity (no uuid).
    #[error("invalid PKR: {0}")]
    InvalidPKR(String),

    /// A uuid or PKR does not correspond to any registered principal.
    #[error("no principal registered for `{0}`")]
    UnknownPKR(String),

    /// Combination of `InvalidPKR`/`UnknownPKR` for call sites that cannot
    /// distinguish the two ahead of time.
    #[error("PKR is invalid or unregistered: {0}")]
    InvalidOrUnknownPKR(String),

    /// `createPrincipal` was asked to use a name already taken.
    #[error("principal name `{0}` is already registered")]
    NameConflict(String),

    /// `createPrincipal(Kernel)` was called while a kernel already exists.
    #[error("a kernel principal is already registered")]
    DuplicateKernel,

    /// `mint`/`createPrincipal` received a kind outside the closed set.
    #[error("`{0}` is not a recognized principal kind")]
    InvalidKind(String),

    /// Identity creation was attempted without a registered kernel.
    #[error("no kernel principal is registered")]
    KernelUnavailable,

    /// The kernel instance lacks the capability identity creation depends on.
    #[error("kernel instance does not expose a protected send capability")]
    KernelMissingSendProtected,

    /// `Principal::attach_instance` called twice.
    #[error("principal `{0}` already has an attached instance")]
    AlreadyAttached(String),

    /// `Principal::attach_instance` received an unusable instance.
    #[error("instance attached to principal `{0}` is invalid")]
    InvalidInstance(String),
}

pub type Result<T> = std::result::Result<T, SubsystemError>;

impl SubsystemError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetKind::Router => write!(f, "router"),
            FacetKind::Queue => write!(f, "queue"),
            FacetKind::Statistics => write!(f, "statistics"),
            FacetKind::MessageProcessor => write!(f, "message_processor"),
            FacetKind::Scheduler => write!(f, "scheduler"),
            FacetKind::Synchronous => write!(f, "synchronous"),
            FacetKind::Queries => write!(f, "queries"),
            FacetKind::Requests => write!(f, "requests"),
            FacetKind::Listeners => write!(f, "listeners"),
            FacetKind::Custom(name) => write!(f, "{name}"),
        }
    }
}
