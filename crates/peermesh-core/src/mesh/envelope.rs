//! Wire envelopes exchanged over a connection
//!
//! Every value sent over a link is a JSON object with a `kind` tag and a
//! `contents` payload:
//!
//! ```text
//! { "kind": "message",  "contents": { "body": "...", "from": "<id>", "to": ["<id>", ...] } }
//! { "kind": "peer-ids", "contents": ["<id>", "<id>", ...] }
//! ```
//!
//! Transports move [`WireEnvelope`]s, which are deliberately loose: a
//! remote peer can put anything in `contents`. Converting to the closed
//! [`Envelope`] type is where shape validation happens, and where an
//! unknown `kind` is turned into [`MeshError::UnknownEnvelopeKind`] so the
//! data loop can log and discard it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::Message;
use crate::error::{MeshError, MeshResult};
use crate::types::PeerId;

/// `kind` tag for chat messages
pub const KIND_MESSAGE: &str = "message";

/// `kind` tag for peer-id gossip
pub const KIND_PEER_IDS: &str = "peer-ids";

/// Untyped envelope as it travels over the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Envelope kind tag
    pub kind: String,
    /// Kind-specific payload
    pub contents: Value,
}

impl WireEnvelope {
    /// Build a wire envelope from raw parts
    pub fn new(kind: impl Into<String>, contents: Value) -> Self {
        Self {
            kind: kind.into(),
            contents,
        }
    }

    /// Encode as a single JSON document
    pub fn encode(&self) -> MeshResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from a JSON document
    pub fn decode(data: &[u8]) -> MeshResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Typed envelope: exactly one of the two things peers say to each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// A chat message to apply to the log
    Message(Message),
    /// The full ordered list of peers the leader currently knows
    PeerIds(Vec<PeerId>),
}

impl Envelope {
    /// The wire `kind` tag for this envelope
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Message(_) => KIND_MESSAGE,
            Envelope::PeerIds(_) => KIND_PEER_IDS,
        }
    }

    /// Convert into the untyped wire form
    pub fn to_wire(&self) -> MeshResult<WireEnvelope> {
        let contents = match self {
            Envelope::Message(msg) => serde_json::to_value(msg)?,
            Envelope::PeerIds(ids) => serde_json::to_value(ids)?,
        };
        Ok(WireEnvelope::new(self.kind(), contents))
    }

    /// Decode and validate a wire envelope.
    ///
    /// Returns [`MeshError::Validation`] when `contents` has the wrong shape
    /// for its `kind`, and [`MeshError::UnknownEnvelopeKind`] when the kind
    /// is not one this node speaks.
    pub fn from_wire(wire: WireEnvelope) -> MeshResult<Self> {
        match wire.kind.as_str() {
            KIND_MESSAGE => {
                let msg: Message = serde_json::from_value(wire.contents).map_err(|e| {
                    MeshError::Validation(format!("malformed message: {}", e))
                })?;
                Ok(Envelope::Message(msg.validated()?))
            }
            KIND_PEER_IDS => {
                let ids: Vec<PeerId> = serde_json::from_value(wire.contents).map_err(|e| {
                    MeshError::Validation(format!("malformed peer-id list: {}", e))
                })?;
                if ids.iter().any(PeerId::is_empty) {
                    return Err(MeshError::Validation(
                        "peer-id list contains an empty id".to_string(),
                    ));
                }
                Ok(Envelope::PeerIds(ids))
            }
            other => Err(MeshError::UnknownEnvelopeKind(other.to_string())),
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = MeshError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        Envelope::from_wire(wire)
    }
}
