//! Mesh event types for UI and test observers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  MeshEvent: notifications about mesh activity                   │
//! │  ├── RoleChanged: first connection settled the role             │
//! │  ├── PeerConnected: a connection was registered                 │
//! │  ├── GossipSent: leader broadcast its peer-id list              │
//! │  ├── PeerListReceived: follower got a peer-id list              │
//! │  ├── DialStarted: an outgoing connection attempt began          │
//! │  ├── MessageSent / MessageReceived: log grew                    │
//! │  ├── EnvelopeRejected: inbound envelope failed validation       │
//! │  └── TransportError: transport or dial failure (non-fatal)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use crate::chat::Message;
use crate::mesh::role::Role;
use crate::types::{Direction, PeerId};

/// Events emitted by a running mesh node
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// The node's role was settled
    RoleChanged {
        /// The new, terminal role
        role: Role,
    },
    /// A connection was registered
    PeerConnected {
        /// Remote end of the connection
        peer_id: PeerId,
        /// Who initiated it
        direction: Direction,
        /// Registry size after registration
        peer_count: usize,
    },
    /// The leader sent its peer-id list to every connection
    GossipSent {
        /// The list that was sent
        peers: Vec<PeerId>,
        /// How many connections accepted the envelope
        recipients: usize,
    },
    /// A peer-id list arrived
    PeerListReceived {
        /// Connection it arrived on
        from: PeerId,
        /// The advertised list
        peers: Vec<PeerId>,
        /// The subset this node will dial
        undiscovered: Vec<PeerId>,
    },
    /// An outgoing connection attempt was handed to the transport
    DialStarted {
        /// Target of the attempt
        peer_id: PeerId,
    },
    /// A local message was broadcast and logged
    MessageSent {
        /// The logged message
        message: Message,
        /// How many connections accepted it
        recipients: usize,
    },
    /// A remote message was validated and logged
    MessageReceived {
        /// The logged message
        message: Message,
    },
    /// An inbound envelope was discarded
    EnvelopeRejected {
        /// Connection it arrived on
        from: PeerId,
        /// Why it was discarded
        reason: String,
    },
    /// The transport reported a failure
    TransportError {
        /// Peer involved, when the failure concerns one connection
        peer_id: Option<PeerId>,
        /// Error message
        message: String,
    },
}

impl MeshEvent {
    /// Get the peer ID associated with this event, if any
    pub fn peer_id(&self) -> Option<&PeerId> {
        match self {
            MeshEvent::PeerConnected { peer_id, .. } => Some(peer_id),
            MeshEvent::PeerListReceived { from, .. } => Some(from),
            MeshEvent::DialStarted { peer_id } => Some(peer_id),
            MeshEvent::MessageReceived { message } => Some(message.from()),
            MeshEvent::EnvelopeRejected { from, .. } => Some(from),
            MeshEvent::TransportError { peer_id, .. } => peer_id.as_ref(),
            MeshEvent::RoleChanged { .. }
            | MeshEvent::GossipSent { .. }
            | MeshEvent::MessageSent { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_event_peer_id() {
        let event = MeshEvent::PeerConnected {
            peer_id: PeerId::new("bob"),
            direction: Direction::Incoming,
            peer_count: 1,
        };
        assert_eq!(event.peer_id(), Some(&PeerId::new("bob")));

        let event = MeshEvent::MessageReceived {
            message: Message::new("hi", PeerId::new("carol"), vec![]),
        };
        assert_eq!(event.peer_id(), Some(&PeerId::new("carol")));

        let event = MeshEvent::RoleChanged { role: Role::Leader };
        assert_eq!(event.peer_id(), None);

        let event = MeshEvent::TransportError {
            peer_id: None,
            message: "relay unreachable".to_string(),
        };
        assert_eq!(event.peer_id(), None);
    }
}
