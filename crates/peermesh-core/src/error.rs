//! Error types for peermesh

use thiserror::Error;

use crate::types::PeerId;

/// Main error type for peermesh operations
#[derive(Error, Debug)]
pub enum MeshError {
    /// A message or peer-id list did not have the expected shape
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Envelope carried a `kind` this node does not understand
    #[error("Unknown envelope kind: {0}")]
    UnknownEnvelopeKind(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transport-level failure (endpoint, accept loop, signaling)
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outgoing connection attempt failed to open
    #[error("Connection to {peer} failed: {reason}")]
    Connection {
        /// The peer we tried to reach
        peer: PeerId,
        /// What went wrong
        reason: String,
    },

    /// The connection's channel is gone; the envelope was not delivered
    #[error("Connection to {0} is closed")]
    ConnectionClosed(PeerId),

    /// A peer id could not be interpreted by the transport
    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),

    /// The node's event loops are no longer running
    #[error("Mesh node has stopped")]
    NodeStopped,

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

/// Result type alias using MeshError
pub type MeshResult<T> = Result<T, MeshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MeshError::Validation("body is empty".to_string());
        assert_eq!(format!("{}", err), "Validation failed: body is empty");

        let err = MeshError::Connection {
            peer: PeerId::new("peer-b"),
            reason: "unreachable".to_string(),
        };
        assert_eq!(format!("{}", err), "Connection to peer-b failed: unreachable");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let mesh_err: MeshError = io_err.into();
        assert!(matches!(mesh_err, MeshError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let mesh_err: MeshError = json_err.into();
        assert!(matches!(mesh_err, MeshError::Serialization(_)));
    }
}
