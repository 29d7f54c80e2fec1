//! Ordered collection of established connections

use tracing::warn;

use crate::error::MeshResult;
use crate::mesh::envelope::Envelope;
use crate::transport::Connection;
use crate::types::PeerId;

/// Every connection this node has registered, in registration order.
///
/// The registry only grows. There is no de-duplication by peer: two links
/// to the same peer (for example from duplicate dials) are both kept.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a connection
    pub fn register(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Every connection in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Remote peer ids in registration order
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.iter().map(|c| c.remote_peer_id().clone()).collect()
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connection has been registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send `envelope` on every connection.
    ///
    /// A failure on one connection is logged and does not stop the others.
    /// Returns how many connections accepted the envelope.
    pub fn broadcast(&self, envelope: &Envelope) -> MeshResult<usize> {
        let wire = envelope.to_wire()?;
        let mut delivered = 0;
        for conn in self.iter() {
            match conn.send_wire(wire.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    peer = %conn.remote_peer_id(),
                    kind = envelope.kind(),
                    error = %e,
                    "Failed to send envelope"
                ),
            }
        }
        Ok(delivered)
    }
}
