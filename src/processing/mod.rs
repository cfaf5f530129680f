//! Message-core facets: queue wrapper, processor, scheduler, synchronous
//! driver, queries, requests, and listeners.

mod listeners;
mod message_processor;
mod queries;
mod queue_facet;
mod requests;
mod scheduler;
mod synchronous;

pub use listeners::{ListenerHandler, ListenerId, Listeners};
pub use message_processor::{AcceptOutcome, DispatchOptions, MessageProcessor, TickResult};
pub use queries::{QueryHandler, Queries, QUERY_ROUTE_DESCRIPTION, QUERY_ROUTE_PATTERN, QUERY_ROUTE_PRIORITY};
pub use queue_facet::QueueFacet;
pub use requests::Requests;
pub use scheduler::{ProcessStatus, Scheduler};
pub use synchronous::Synchronous;
