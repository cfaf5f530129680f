//! The `Message` value object: immutable, produced once at construction.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::clock::IdGen;

use super::trace::{generate_trace_id, inherit_trace_id};

/// Metadata carried alongside every message body.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageMeta {
    pub trace_id: String,
    pub correlation_id: Option<String>,
    pub timestamp: Option<u64>,
    pub tags: HashMap<String, Value>,
    /// Set by the [`crate::processing::synchronous::Synchronous`] facet to force
    /// inline dispatch; preserved rather than replacing the whole meta struct.
    pub process_immediately: bool,
}

impl Default for MessageMeta {
    fn default() -> Self {
        Self {
            trace_id: String::new(),
            correlation_id: None,
            timestamp: None,
            tags: HashMap::new(),
            process_immediately: false,
        }
    }
}

/// Construction options for [`Message::new`].
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    pub trace_id: Option<String>,
    pub parent_message: Option<Arc<Message>>,
    pub correlation_id: Option<String>,
    pub timestamp: Option<u64>,
    pub tags: HashMap<String, Value>,
}

/// Immutable value: `{ path, body, meta }`. Never mutated after construction;
/// derived messages (e.g. with forced `process_immediately`) are built by
/// cloning and replacing `meta`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub path: String,
    pub body: Value,
    pub meta: MessageMeta,
}

impl Message {
    /// Infallible by construction: `path` is taken verbatim, including
    /// empty. [`crate::processing::MessageProcessor::accept`] and
    /// `process_immediately` are where a message actually enters dispatch,
    /// and reject an empty `path` with `InvalidArgument` there.
    pub fn new(path: impl Into<String>, body: Value, options: MessageOptions, id_gen: &dyn IdGen) -> Self {
        let trace_id = options
            .trace_id
            .or_else(|| {
                options
                    .parent_message
                    .as_ref()
                    .and_then(|p| inherit_trace_id(Some(&p.meta.trace_id)))
            })
            .unwrap_or_else(|| generate_trace_id(id_gen));

        Message {
            path: path.into(),
            body,
            meta: MessageMeta {
                trace_id,
                correlation_id: options.correlation_id,
                timestamp: options.timestamp,
                tags: options.tags,
                process_immediately: false,
            },
        }
    }

    /// Returns a clone with `meta.process_immediately` set, preserving every
    /// other meta field. Used by the Synchronous facet's `accept`.
    pub fn with_process_immediately(&self) -> Self {
        let mut clone = self.clone();
        clone.meta.process_immediately = true;
        clone
    }

    pub fn with_correlation_id(&self, correlation_id: impl Into<String>) -> Self {
        let mut clone = self.clone();
        clone.meta.correlation_id = Some(correlation_id.into());
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RandomIdGen;

    #[test]
    fn new_generates_v4_trace_id_by_default() {
        let msg = Message::new("a/b", Value::Null, MessageOptions::default(), &RandomIdGen);
        assert_eq!(uuid::Uuid::parse_str(&msg.meta.trace_id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn explicit_trace_id_overrides_generation() {
        let opts = MessageOptions {
            trace_id: Some("fixed-id".to_string()),
            ..Default::default()
        };
        let msg = Message::new("a/b", Value::Null, opts, &RandomIdGen);
        assert_eq!(msg.meta.trace_id, "fixed-id");
    }

    #[test]
    fn child_inherits_parent_trace_id() {
        let parent = Arc::new(Message::new("a", Value::Null, MessageOptions::default(), &RandomIdGen));
        let opts = MessageOptions {
            parent_message: Some(parent.clone()),
            ..Default::default()
        };
        let child = Message::new("b", Value::Null, opts, &RandomIdGen);
        assert_eq!(child.meta.trace_id, parent.meta.trace_id);
    }

    #[test]
    fn explicit_trace_id_wins_over_parent() {
        let parent = Arc::new(Message::new("a", Value::Null, MessageOptions::default(), &RandomIdGen));
        let opts = MessageOptions {
            parent_message: Some(parent),
            trace_id: Some("explicit".to_string()),
            ..Default::default()
        };
        let child = Message::new("b", Value::Null, opts, &RandomIdGen);
        assert_eq!(child.meta.trace_id, "explicit");
    }
}
