//! Transport seam: how links between peers come into existence
//!
//! The mesh core does not know how bytes move. A [`Transport`] knows its
//! own [`PeerId`], accepts incoming links once `listen` is called, and
//! starts outgoing attempts on `dial`. Both directions report back through
//! a [`TransportSink`]:
//!
//! ```text
//!   Transport ──opened(Connection)──▶ connection event loop
//!       │
//!       └──────errors──────────────▶ tracing + MeshEvent::TransportError
//! ```
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryTransport`]: in-process hub, used by tests and `simulate`
//! - [`IrohTransport`]: direct QUIC links via iroh

mod connection;
pub mod iroh;
pub mod memory;

pub use connection::Connection;
pub use iroh::{IrohTransport, MESH_ALPN};
pub use memory::{MemoryNetwork, MemoryTransport};

use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::error::{MeshError, MeshResult};
use crate::mesh::events::MeshEvent;
use crate::types::PeerId;

/// Where a transport delivers opened connections and failures
#[derive(Clone)]
pub struct TransportSink {
    connections: mpsc::UnboundedSender<Connection>,
    events: broadcast::Sender<MeshEvent>,
}

impl TransportSink {
    /// Create a sink feeding the given connection queue and event channel
    pub fn new(
        connections: mpsc::UnboundedSender<Connection>,
        events: broadcast::Sender<MeshEvent>,
    ) -> Self {
        Self {
            connections,
            events,
        }
    }

    /// A link opened (either direction); enqueue it for registration
    pub fn opened(&self, connection: Connection) {
        let peer = connection.remote_peer_id().clone();
        if self.connections.send(connection).is_err() {
            debug!(%peer, "Connection event loop gone, dropping opened connection");
        }
    }

    /// An outgoing attempt to `peer` failed to open. Nothing is registered.
    pub fn connection_failed(&self, peer: &PeerId, reason: impl fmt::Display) {
        let err = MeshError::Connection {
            peer: peer.clone(),
            reason: reason.to_string(),
        };
        warn!(%peer, error = %err, "Outgoing connection failed");
        let _ = self.events.send(MeshEvent::TransportError {
            peer_id: Some(peer.clone()),
            message: err.to_string(),
        });
    }

    /// A transport-level failure not tied to one attempt (accept, signaling)
    pub fn transport_error(&self, err: &MeshError) {
        warn!(error = %err, "Transport error");
        let _ = self.events.send(MeshEvent::TransportError {
            peer_id: None,
            message: err.to_string(),
        });
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink")
            .field("connections", &"<UnboundedSender<Connection>>")
            .field("events", &"<Sender<MeshEvent>>")
            .finish()
    }
}

/// Something that can originate and accept links to other peers
pub trait Transport: Send + Sync + 'static {
    /// This process's identity on the transport
    fn local_peer_id(&self) -> &PeerId;

    /// Start accepting incoming links; each is delivered via
    /// [`TransportSink::opened`] as an `Incoming` connection
    fn listen(&self, sink: TransportSink) -> MeshResult<()>;

    /// Start an outgoing attempt to `remote`.
    ///
    /// Returns immediately. On success an `Outgoing` connection is delivered
    /// via [`TransportSink::opened`]; on failure the error is reported via
    /// [`TransportSink::connection_failed`].
    fn dial(&self, remote: PeerId, sink: TransportSink);
}
