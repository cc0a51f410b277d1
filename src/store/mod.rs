//! In-memory message store
//!
//! A single ordered sequence of client-supplied records that lives for the
//! whole process. Records are only ever appended or reordered. Every operation
//! takes the lock exactly once, so a caller's snapshot is never torn by a
//! concurrent request.

mod order;

pub use order::OrderInstruction;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// One chat message, stored verbatim as the JSON object the client sent
pub type Message = Map<String, Value>;

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` and return the sequence as it stands right after
    pub async fn append(&self, record: Message) -> Vec<Message> {
        let mut messages = self.messages.write().await;
        messages.push(record);
        messages.clone()
    }

    /// Full sequence in physical order
    pub async fn list_all(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Reorder the stored sequence in place and return it
    pub async fn sort(&self, order: &OrderInstruction) -> Vec<Message> {
        let mut messages = self.messages.write().await;
        order.apply(&mut messages);
        messages.clone()
    }

    /// Sorted copy of the sequence; stored order is left untouched
    pub async fn sorted_view(&self, order: &OrderInstruction) -> Vec<Message> {
        let mut snapshot = self.list_all().await;
        order.apply(&mut snapshot);
        snapshot
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }
}
