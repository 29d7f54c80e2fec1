//! Chat message type and shape validation

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::types::PeerId;

/// A free-text message broadcast to every known peer.
///
/// `to` is a snapshot of the sender's known peers at send time, not a live
/// set. Fields are private so a validated message cannot be altered after
/// the fact.
///
/// # Example
///
/// ```ignore
/// let msg = Message::new("hello", PeerId::new("alice"), vec![PeerId::new("bob")]);
/// msg.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    body: String,
    from: PeerId,
    to: Vec<PeerId>,
}

impl Message {
    /// Create a new message. Call [`Message::validate`] before using it.
    pub fn new(body: impl Into<String>, from: PeerId, to: Vec<PeerId>) -> Self {
        Self {
            body: body.into(),
            from,
            to,
        }
    }

    /// Message text
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Originating peer
    pub fn from(&self) -> &PeerId {
        &self.from
    }

    /// Peers the sender knew about when sending
    pub fn to(&self) -> &[PeerId] {
        &self.to
    }

    /// Check the message shape.
    ///
    /// `body` and `from` must be non-empty and every recipient id must be
    /// non-empty. Type-level shape errors (a non-list `to`, a non-string
    /// `from`) are caught earlier, when the envelope is decoded.
    pub fn validate(&self) -> MeshResult<()> {
        if self.body.is_empty() {
            return Err(MeshError::Validation("message body is empty".to_string()));
        }
        if self.from.is_empty() {
            return Err(MeshError::Validation("message sender is empty".to_string()));
        }
        if let Some(pos) = self.to.iter().position(PeerId::is_empty) {
            return Err(MeshError::Validation(format!(
                "message recipient #{} is empty",
                pos
            )));
        }
        Ok(())
    }

    /// Validate and hand the message back, for use in `?` chains
    pub fn validated(self) -> MeshResult<Self> {
        self.validate()?;
        Ok(self)
    }
}
