//! Peermesh Core Library
//!
//! A small peer-to-peer chat mesh: peers negotiate a leader/follower role
//! from the direction of their first connection, the leader gossips the
//! peer list, and followers dial whoever they have not met yet until every
//! peer is linked to every other.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use peermesh_core::{MeshConfig, MeshNode, IrohTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(IrohTransport::bind(&MeshConfig::default()).await?);
//!     let node = MeshNode::start(transport)?;
//!     println!("my id: {}", node.local_id());
//!
//!     node.connect("<leader endpoint id>".into())?;
//!     node.send_message("hello mesh").await?;
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod mesh;
pub mod transport;
pub mod types;

// Re-exports
pub use chat::{Message, MessageLog};
pub use config::{MeshConfig, SignalingServer};
pub use error::{MeshError, MeshResult};
pub use mesh::{Envelope, MeshEvent, MeshNode, MeshSnapshot, Role, WireEnvelope};
pub use transport::{
    Connection, IrohTransport, MemoryNetwork, MemoryTransport, Transport, TransportSink, MESH_ALPN,
};
pub use types::{Direction, PeerId};
