//! Message value type, factory, and trace-id contracts.

mod factory;
mod trace;
mod value;

pub use factory::MessageFactory;
pub use trace::{
    extract_trace_id_from_headers, generate_trace_id, inherit_trace_id,
    inject_trace_id_into_headers, TRACEPARENT_HEADER, TRACE_HEADER,
};
pub use value::{Message, MessageMeta, MessageOptions};
