//! Core types for peermesh

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a peer for the lifetime of a session
///
/// The core never looks inside a `PeerId`; it is whatever string the
/// transport hands out (for the iroh transport, the endpoint id). Two peers
/// with equal ids are assumed to be the same process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a transport-provided identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shortened form for log lines and terminal output
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(10)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which side initiated a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The remote peer dialed us
    Incoming,
    /// We dialed the remote peer and the link opened
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let id = PeerId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");

        let parsed: PeerId = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(parsed, PeerId::new("xyz"));
    }

    #[test]
    fn test_peer_id_short() {
        assert_eq!(PeerId::new("abc").short(), "abc");
        assert_eq!(PeerId::new("0123456789abcdef").short(), "0123456789");
        // Multi-byte characters are never split
        assert_eq!(PeerId::new("ééééééééééééé").short(), "éééééééééé");
    }

    #[test]
    fn test_direction_display_and_serde() {
        assert_eq!(format!("{}", Direction::Outgoing), "outgoing");
        assert_eq!(serde_json::to_string(&Direction::Incoming).unwrap(), "\"incoming\"");
    }
}
