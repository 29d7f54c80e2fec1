//! Role negotiation, gossip discovery and the node event loops
//!
//! ```text
//! Transport ──▶ connection loop ──▶ { role, registry, forwarder }
//!                                          │
//!                     data loop ◀──────────┘
//!                        ├── message   ──▶ chat log
//!                        └── peer-ids  ──▶ discovery ──▶ Transport::dial
//! ```

pub mod discovery;
pub mod envelope;
pub mod events;
pub mod node;
pub mod registry;
pub mod role;
pub mod state;

pub use envelope::{Envelope, WireEnvelope};
pub use events::MeshEvent;
pub use node::{MeshNode, MeshSnapshot};
pub use registry::ConnectionRegistry;
pub use role::Role;
pub use state::{Inbound, MeshState, Reaction};
