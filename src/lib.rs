//! In-process, message-oriented subsystem framework.
//!
//! A [`subsystem::BaseSubsystem`] is built from a set of facet hooks: the
//! builder resolves hook dependencies into an install order (caching that
//! order across subsystems with identical hook shapes), instantiates each
//! facet, and installs them transactionally. Once built, callers push
//! messages in with `accept`, which either dispatches inline (a
//! [`processing::Synchronous`] facet installed) or enqueues for
//! [`processing::Scheduler`] to drain in cooperative time slices.

pub mod clock;
pub mod context;
pub mod error;
pub mod facet;
pub mod future;
pub mod message;
pub mod path;
pub mod processing;
pub mod queue;
pub mod resolver;
pub mod router;
pub mod security;
pub mod statistics;
pub mod subsystem;

pub use clock::{Clock, FixedClock, IdGen, MonotonicInstant, RandomIdGen, SystemClock};
pub use context::{BuildContext, ExternalMessageSystem};
pub use error::{Result, SubsystemError};
pub use facet::{
    router_contract, scheduler_contract, BuildFn, FacetApi, FacetContract, FacetKind, FacetManager,
    FacetRecord, HookDescriptor, LifecycleCallback, PartialFacets,
};
pub use future::BoxFuture;
pub use message::{
    extract_trace_id_from_headers, generate_trace_id, inherit_trace_id, inject_trace_id_into_headers,
    Message, MessageFactory, MessageMeta, MessageOptions, TRACEPARENT_HEADER, TRACE_HEADER,
};
pub use path::{MatchOutcome, PathMatcher, Segment};
pub use processing::{
    AcceptOutcome, DispatchOptions, ListenerHandler, ListenerId, Listeners, MessageProcessor,
    ProcessStatus, QueryHandler, Queries, QueueFacet, Requests, Scheduler, Synchronous, TickResult,
    QUERY_ROUTE_DESCRIPTION, QUERY_ROUTE_PATTERN, QUERY_ROUTE_PRIORITY,
};
pub use queue::{BoundedQueue, EnqueueOutcome, OverflowPolicy, QueueItem, QueueStats};
pub use resolver::{fingerprint, DependencyGraphCache, DependencyResolver, Plan, SubsystemBuilder};
pub use router::{Route, RouteHandle, RouteHandler, RouteOptions, Router};
pub use security::{
    ArcKernelCapability, CreatePrincipalOptions, Identity, KernelCapability, Principal, PrincipalKind,
    PrincipalRegistry, ReaderWriterSet, PKR,
};
pub use statistics::{ProcessingMetrics, Statistics, StatisticsSnapshot};
pub use subsystem::{BaseSubsystem, SubsystemOptions};
