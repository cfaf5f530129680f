//! Thin constructor facade mirroring the library's `MessageFactory.create`.

use serde_json::Value;

use crate::clock::IdGen;

use super::value::{Message, MessageOptions};

/// Stateless factory; exists so call sites can depend on a trait object
/// rather than the concrete `Message::new` constructor.
pub struct MessageFactory<'a> {
    id_gen: &'a dyn IdGen,
}

impl<'a> MessageFactory<'a> {
    pub fn new(id_gen: &'a dyn IdGen) -> Self {
        Self { id_gen }
    }

    pub fn create(&self, path: impl Into<String>, body: Value, options: MessageOptions) -> Message {
        Message::new(path, body, options, self.id_gen)
    }
}
