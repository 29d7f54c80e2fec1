//! Append-only message log

use crate::chat::message::Message;
use crate::error::MeshResult;

/// Ordered record of every message this node has applied.
///
/// Local sends and remote receipts land in the same log and are not
/// distinguished once stored. Entries are only ever appended, and only
/// after passing validation.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `message` and append it.
    ///
    /// On validation failure nothing is appended and the error is returned.
    pub fn append(&mut self, message: Message) -> MeshResult<&Message> {
        let message = message.validated()?;
        self.entries.push(message);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// All messages in insertion order
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Number of messages in the log
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
