//! Leader/follower role negotiation
//!
//! A node starts `Undecided`. The direction of the first connection it
//! processes settles the role for the rest of the session:
//!
//! ```text
//!              incoming              outgoing
//!   Leader <------------ Undecided ------------> Follower
//! ```
//!
//! Both `Leader` and `Follower` are terminal. A leader that later dials out
//! stays a leader.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// This node's role in the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// No connection has been processed yet
    #[default]
    Undecided,
    /// Accepted the first connection; brokers peer-id gossip
    Leader,
    /// Originated the first connection; fills in mesh edges from gossip
    Follower,
}

impl Role {
    /// Role after processing a new connection in `direction`
    pub fn after_connection(self, direction: Direction) -> Role {
        match (self, direction) {
            (Role::Undecided, Direction::Incoming) => Role::Leader,
            (Role::Undecided, Direction::Outgoing) => Role::Follower,
            (decided, _) => decided,
        }
    }

    /// Whether the role has been settled
    pub fn is_decided(self) -> bool {
        self != Role::Undecided
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Undecided => write!(f, "undecided"),
            Role::Leader => write!(f, "leader"),
            Role::Follower => write!(f, "follower"),
        }
    }
}
