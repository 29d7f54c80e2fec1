//! The synchronous core of a mesh node
//!
//! `MeshState` holds the role, the connection registry and the message
//! log. Every method here runs to completion without awaiting; the event
//! loops in [`crate::mesh::node`] call into it one item at a time.

use tracing::{debug, info};

use crate::chat::{Message, MessageLog};
use crate::error::MeshResult;
use crate::mesh::discovery;
use crate::mesh::envelope::{Envelope, WireEnvelope};
use crate::mesh::registry::ConnectionRegistry;
use crate::mesh::role::Role;
use crate::transport::Connection;
use crate::types::{Direction, PeerId};

/// What processing a new connection did beyond registering it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// The first connection settled the role
    RoleDecided(Role),
    /// The leader sent its peer list to every connection
    Gossiped {
        /// The list that was sent
        peers: Vec<PeerId>,
        /// Connections that accepted it
        recipients: usize,
    },
    /// Nothing further to do
    None,
}

/// Outcome of handling one inbound envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A message was validated and appended to the log
    Delivered(Message),
    /// A follower got a peer list; `undiscovered` must be dialed
    PeerList {
        /// The advertised list
        peers: Vec<PeerId>,
        /// Ids not yet known to this node
        undiscovered: Vec<PeerId>,
    },
    /// A peer list arrived while not a follower and was discarded
    PeerListIgnored,
}

/// Role, registry and log of one node
#[derive(Debug)]
pub struct MeshState {
    local: PeerId,
    role: Role,
    registry: ConnectionRegistry,
    log: MessageLog,
}

impl MeshState {
    /// Fresh state: undecided, no connections, empty log
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            role: Role::Undecided,
            registry: ConnectionRegistry::new(),
            log: MessageLog::new(),
        }
    }

    /// This node's id
    pub fn local_id(&self) -> &PeerId {
        &self.local
    }

    /// Current role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Registered connections
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Ordered remote peer ids
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.registry.peer_ids()
    }

    /// The message log
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Append a connection to the registry
    pub fn register(&mut self, connection: Connection) {
        debug!(
            peer = %connection.remote_peer_id(),
            direction = %connection.direction(),
            "Registering connection"
        );
        self.registry.register(connection);
    }

    /// Run the reaction for a connection that has just been registered.
    ///
    /// | role before | direction | reaction                          |
    /// |-------------|-----------|-----------------------------------|
    /// | Undecided   | Incoming  | become Leader                     |
    /// | Leader      | Incoming  | gossip peer list to every link    |
    /// | Follower    | Incoming  | nothing                           |
    /// | Undecided   | Outgoing  | become Follower                   |
    /// | decided     | Outgoing  | nothing                           |
    pub fn react(&mut self, direction: Direction, remote: &PeerId) -> MeshResult<Reaction> {
        let before = self.role;
        let after = before.after_connection(direction);
        if after != before {
            info!(peer = %remote, %direction, role = %after, "Role decided");
            self.role = after;
            return Ok(Reaction::RoleDecided(after));
        }

        match (before, direction) {
            (Role::Leader, Direction::Incoming) => {
                let peers = self.registry.peer_ids();
                let recipients = self
                    .registry
                    .broadcast(&discovery::announce(&self.registry))?;
                info!(peer = %remote, peers = peers.len(), recipients, "Gossiped peer list");
                Ok(Reaction::Gossiped { peers, recipients })
            }
            (Role::Follower, Direction::Incoming) => {
                debug!(peer = %remote, "Follower accepted connection");
                Ok(Reaction::None)
            }
            _ => {
                debug!(peer = %remote, %direction, role = %before, "No reaction");
                Ok(Reaction::None)
            }
        }
    }

    /// Decode, validate and apply one inbound envelope from `from`.
    ///
    /// Errors leave the state untouched.
    pub fn handle_envelope(&mut self, from: &PeerId, wire: WireEnvelope) -> MeshResult<Inbound> {
        match Envelope::from_wire(wire)? {
            Envelope::Message(message) => {
                let message = self.receive_message(message)?;
                Ok(Inbound::Delivered(message))
            }
            Envelope::PeerIds(peers) => {
                if self.role != Role::Follower {
                    debug!(peer = %from, role = %self.role, "Discarding peer list");
                    return Ok(Inbound::PeerListIgnored);
                }
                let undiscovered =
                    discovery::undiscovered(&peers, &self.registry.peer_ids(), &self.local);
                debug!(
                    peer = %from,
                    advertised = peers.len(),
                    undiscovered = undiscovered.len(),
                    "Received peer list"
                );
                Ok(Inbound::PeerList {
                    peers,
                    undiscovered,
                })
            }
        }
    }

    /// Validate a remote message and append it to the log
    pub fn receive_message(&mut self, message: Message) -> MeshResult<Message> {
        let message = self.log.append(message)?;
        info!(from = %message.from(), "Message received");
        Ok(message.clone())
    }

    /// Build, validate and broadcast a local message, then append it.
    ///
    /// Returns the message and how many connections accepted it.
    pub fn send_message(&mut self, body: impl Into<String>) -> MeshResult<(Message, usize)> {
        let message =
            Message::new(body, self.local.clone(), self.registry.peer_ids()).validated()?;
        let recipients = self
            .registry
            .broadcast(&Envelope::Message(message.clone()))?;
        let message = self.log.append(message)?.clone();
        info!(recipients, "Message sent");
        Ok((message, recipients))
    }
}
