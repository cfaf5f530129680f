//! Wraps [`BoundedQueue`] for subsystem use and reports status.

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::queue::{BoundedQueue, EnqueueOutcome, OverflowPolicy, QueueItem};
use crate::statistics::Statistics;
use std::sync::Arc;

/// The Queue facet. If a [`Statistics`] facet was already installed earlier
/// in plan order, its `full` events are forwarded to
/// `Statistics::record_queue_full`.
pub struct QueueFacet {
    queue: Mutex<BoundedQueue>,
}

impl QueueFacet {
    pub fn new(capacity: usize, policy: OverflowPolicy, statistics: Option<Arc<Statistics>>) -> Self {
        let mut queue = BoundedQueue::new(capacity, policy);
        if let Some(stats) = statistics {
            queue.on_full(move || stats.record_queue_full());
        }
        Self {
            queue: Mutex::new(queue),
        }
    }

    pub fn enqueue(&self, item: QueueItem) -> EnqueueOutcome {
        self.queue.lock().enqueue(item)
    }

    /// FIFO selection that is also removal, nothing fancier than a plain
    /// dequeue. The processor calls this and owns the removed item.
    pub fn select_next_message(&self) -> Option<QueueItem> {
        self.queue.lock().dequeue()
    }

    pub fn has_messages_to_process(&self) -> bool {
        self.queue.lock().size() > 0
    }

    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    /// `{size, capacity, utilization, isEmpty, isFull, ...additional}`.
    /// `additional` must be a JSON object; its keys are spread into the
    /// result, overriding nothing the core fields already define.
    pub fn get_queue_status(&self, additional: &Value) -> Value {
        let queue = self.queue.lock();
        let size = queue.size();
        let capacity = queue.capacity();
        let utilization = if capacity == 0 {
            0.0
        } else {
            size as f64 / capacity as f64
        };

        let mut map = Map::new();
        map.insert("size".to_string(), Value::from(size));
        map.insert("capacity".to_string(), Value::from(capacity));
        map.insert("utilization".to_string(), Value::from(utilization));
        map.insert("isEmpty".to_string(), Value::from(size == 0));
        map.insert("isFull".to_string(), Value::from(size >= capacity));

        if let Some(extra) = additional.as_object() {
            for (k, v) in extra {
                map.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RandomIdGen;
    use crate::message::{Message, MessageOptions};

    fn item(path: &str) -> QueueItem {
        let gen = RandomIdGen;
        QueueItem {
            message: Message::new(path, Value::Null, MessageOptions::default(), &gen),
            options: Value::Null,
        }
    }

    #[test]
    fn status_reports_core_fields_and_merges_additional() {
        let facet = QueueFacet::new(2, OverflowPolicy::Reject, None);
        facet.enqueue(item("a"));
        let status = facet.get_queue_status(&serde_json::json!({"note": "x"}));
        assert_eq!(status["size"], 1);
        assert_eq!(status["capacity"], 2);
        assert_eq!(status["isEmpty"], false);
        assert_eq!(status["isFull"], false);
        assert_eq!(status["note"], "x");
    }

    #[test]
    fn full_events_forward_to_statistics() {
        let stats = Arc::new(Statistics::new());
        let facet = QueueFacet::new(1, OverflowPolicy::Reject, Some(stats.clone()));
        facet.enqueue(item("a"));
        facet.enqueue(item("b"));
        assert_eq!(stats.get_statistics().queue_full_events, 1);
    }

    #[test]
    fn select_next_message_is_fifo() {
        let facet = QueueFacet::new(3, OverflowPolicy::Reject, None);
        facet.enqueue(item("1"));
        facet.enqueue(item("2"));
        assert_eq!(facet.select_next_message().unwrap().message.path, "1");
        assert_eq!(facet.select_next_message().unwrap().message.path, "2");
        assert!(facet.select_next_message().is_none());
    }
}
