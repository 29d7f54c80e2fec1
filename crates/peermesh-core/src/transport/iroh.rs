//! Direct QUIC links between peers using iroh
//!
//! Each mesh link is one iroh connection on [`MESH_ALPN`] carrying a single
//! bidirectional stream of length-delimited JSON frames.
//!
//! ## Link setup
//!
//! ```text
//! Dialer                              Acceptor
//!   |                                   |
//!   |--- connect(endpoint_id, ALPN) --->|
//!   |--- open_bi ---------------------->|  accept_bi
//!   |--- Hello { peer_id } ------------>|  checked against remote_id()
//!   |                                   |
//!   |<========= WireEnvelope frames ===>|
//! ```
//!
//! The hello frame makes the stream visible to the acceptor immediately
//! (QUIC only announces a stream once data is written on it).

use std::fmt;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use iroh::discovery::static_provider::StaticProvider;
use iroh::endpoint::{Connection as QuicConnection, RecvStream, SendStream};
use iroh::protocol::{AcceptError, ProtocolHandler, Router};
use iroh::{Endpoint, EndpointAddr, EndpointId, RelayMap, RelayMode, RelayUrl, SecretKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use super::{Connection, Transport, TransportSink};
use crate::config::MeshConfig;
use crate::error::{MeshError, MeshResult};
use crate::mesh::envelope::WireEnvelope;
use crate::types::{Direction, PeerId};

/// ALPN protocol identifier for mesh links
pub const MESH_ALPN: &[u8] = b"/peermesh/1";

/// Largest frame accepted on a link
const MAX_FRAME_SIZE: usize = 1024 * 1024; // 1MB

type FrameReader = FramedRead<RecvStream, LengthDelimitedCodec>;
type FrameWriter = FramedWrite<SendStream, LengthDelimitedCodec>;

/// First frame on every link, written by the dialer
#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    peer_id: PeerId,
}

fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_SIZE)
        .new_codec()
}

/// Transport backed by an iroh endpoint
pub struct IrohTransport {
    endpoint: Endpoint,
    local: PeerId,
    /// Static discovery provider for adding out-of-band peer addresses
    static_provider: StaticProvider,
    router: Mutex<Option<Router>>,
}

impl IrohTransport {
    /// Bind a fresh endpoint with a new session identity.
    ///
    /// If the config names a signaling server it replaces the default relays.
    pub async fn bind(config: &MeshConfig) -> MeshResult<Self> {
        config.validate()?;

        let secret_key = SecretKey::generate(&mut rand::rng());
        let static_provider = StaticProvider::new();

        let mut builder = Endpoint::builder()
            .secret_key(secret_key)
            .alpns(vec![MESH_ALPN.to_vec()])
            .discovery(static_provider.clone());

        if let Some(server) = &config.signaling {
            let url: RelayUrl = server.url().parse().map_err(|e| {
                MeshError::Config(format!("invalid signaling url {}: {}", server.url(), e))
            })?;
            info!(relay = %url, "Using custom signaling server");
            builder = builder.relay_mode(RelayMode::Custom(RelayMap::from(url)));
        }

        let endpoint = builder
            .bind()
            .await
            .map_err(|e| MeshError::Transport(format!("Failed to bind endpoint: {}", e)))?;

        let local = PeerId::new(endpoint.id().to_string());
        info!(peer = %local, "Endpoint bound");

        Ok(Self {
            endpoint,
            local,
            static_provider,
            router: Mutex::new(None),
        })
    }

    /// Get a reference to the underlying endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// This node's current address (relay URL and direct addresses)
    pub fn endpoint_addr(&self) -> EndpointAddr {
        self.endpoint.addr()
    }

    /// Make a peer's address known without going through discovery
    pub fn add_peer_addr(&self, endpoint_addr: EndpointAddr) {
        debug!(
            peer = %endpoint_addr.id,
            addrs = endpoint_addr.addrs.len(),
            "Adding peer address to static discovery"
        );
        self.static_provider.add_endpoint_info(endpoint_addr);
    }

    /// Stop accepting and close the endpoint
    pub async fn shutdown(&self) {
        let router = self.router.lock().take();
        if let Some(router) = router {
            if let Err(e) = router.shutdown().await {
                warn!(error = %e, "Router shutdown failed");
            }
        }
        self.endpoint.close().await;
        info!(peer = %self.local, "Endpoint closed");
    }

    async fn open_outgoing(
        endpoint: Endpoint,
        local: PeerId,
        remote: PeerId,
        endpoint_id: EndpointId,
    ) -> MeshResult<Connection> {
        let connection = endpoint
            .connect(endpoint_id, MESH_ALPN)
            .await
            .map_err(|e| MeshError::Transport(format!("Failed to connect: {}", e)))?;

        let (send, recv) = connection
            .open_bi()
            .await
            .map_err(|e| MeshError::Transport(format!("Failed to open bi stream: {}", e)))?;

        let mut writer = FramedWrite::new(send, frame_codec());
        let hello = serde_json::to_vec(&Hello { peer_id: local })?;
        writer
            .send(Bytes::from(hello))
            .await
            .map_err(|e| MeshError::Transport(format!("Failed to send hello: {}", e)))?;

        let reader = FramedRead::new(recv, frame_codec());
        Ok(spawn_link(connection, remote, Direction::Outgoing, reader, writer))
    }
}

impl fmt::Debug for IrohTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrohTransport")
            .field("local", &self.local)
            .field("listening", &self.router.lock().is_some())
            .finish()
    }
}

impl Transport for IrohTransport {
    fn local_peer_id(&self) -> &PeerId {
        &self.local
    }

    fn listen(&self, sink: TransportSink) -> MeshResult<()> {
        let mut router = self.router.lock();
        if router.is_some() {
            return Err(MeshError::Transport("already listening".to_string()));
        }
        let handler = MeshProtocolHandler { sink };
        *router = Some(
            Router::builder(self.endpoint.clone())
                .accept(MESH_ALPN, handler)
                .spawn(),
        );
        info!(peer = %self.local, "Mesh protocol handler registered");
        Ok(())
    }

    fn dial(&self, remote: PeerId, sink: TransportSink) {
        let endpoint_id = match parse_endpoint_id(&remote) {
            Ok(id) => id,
            Err(e) => {
                sink.connection_failed(&remote, e);
                return;
            }
        };
        // Register under the same spelling the acceptor sees
        let remote = PeerId::new(endpoint_id.to_string());

        let endpoint = self.endpoint.clone();
        let local = self.local.clone();
        tokio::spawn(async move {
            debug!(peer = %remote, "Dialing");
            match Self::open_outgoing(endpoint, local, remote.clone(), endpoint_id).await {
                Ok(connection) => {
                    info!(peer = %remote, "Outgoing link opened");
                    sink.opened(connection);
                }
                Err(e) => sink.connection_failed(&remote, e),
            }
        });
    }
}

/// Parse a peer id as an iroh endpoint id
fn parse_endpoint_id(peer: &PeerId) -> MeshResult<EndpointId> {
    peer.as_str()
        .trim()
        .parse()
        .map_err(|e| MeshError::InvalidPeerId(format!("{}: {}", peer, e)))
}

/// Protocol handler for incoming mesh links
///
/// Registered with the Router for [`MESH_ALPN`]. Each accepted link is
/// handed to the connection event loop as an `Incoming` connection.
#[derive(Clone)]
struct MeshProtocolHandler {
    sink: TransportSink,
}

impl fmt::Debug for MeshProtocolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshProtocolHandler")
            .field("sink", &"<TransportSink>")
            .finish()
    }
}

impl MeshProtocolHandler {
    async fn handle_connection(connection: QuicConnection, sink: TransportSink) -> MeshResult<()> {
        let remote = PeerId::new(connection.remote_id().to_string());
        debug!(peer = %remote, "Handling incoming mesh connection");

        let (send, recv) = connection
            .accept_bi()
            .await
            .map_err(|e| MeshError::Transport(format!("Failed to accept bi stream: {}", e)))?;

        let mut reader = FramedRead::new(recv, frame_codec());
        let frame = match reader.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                return Err(MeshError::Transport(format!("Failed to read hello: {}", e)))
            }
            None => return Err(MeshError::Transport("Link closed before hello".to_string())),
        };
        let hello: Hello = serde_json::from_slice(&frame)?;
        if hello.peer_id != remote {
            warn!(
                claimed = %hello.peer_id,
                authenticated = %remote,
                "Hello peer id does not match endpoint id, using endpoint id"
            );
        }

        let writer = FramedWrite::new(send, frame_codec());
        sink.opened(spawn_link(connection, remote.clone(), Direction::Incoming, reader, writer));
        info!(peer = %remote, "Incoming link opened");
        Ok(())
    }
}

impl ProtocolHandler for MeshProtocolHandler {
    fn accept(
        &self,
        conn: QuicConnection,
    ) -> impl std::future::Future<Output = Result<(), AcceptError>> + Send {
        let sink = self.sink.clone();

        async move {
            if let Err(e) = Self::handle_connection(conn, sink.clone()).await {
                sink.transport_error(&e);
                return Err(AcceptError::from_err(e));
            }
            Ok(())
        }
    }
}

/// Spawn the reader and writer tasks for one link and return its handle.
///
/// The reader task owns the QUIC connection, so the link stays open until
/// the remote side closes it or a read fails.
fn spawn_link(
    quic: QuicConnection,
    remote: PeerId,
    direction: Direction,
    mut reader: FrameReader,
    mut writer: FrameWriter,
) -> Connection {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireEnvelope>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<WireEnvelope>();

    let writer_peer = remote.clone();
    tokio::spawn(async move {
        while let Some(wire) = outbound_rx.recv().await {
            let bytes = match wire.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(peer = %writer_peer, error = %e, "Failed to encode envelope");
                    continue;
                }
            };
            if let Err(e) = writer.send(Bytes::from(bytes)).await {
                warn!(peer = %writer_peer, error = %e, "Failed to write frame");
                break;
            }
        }
        debug!(peer = %writer_peer, "Link writer finished");
    });

    let reader_peer = remote.clone();
    tokio::spawn(async move {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(bytes) => match WireEnvelope::decode(&bytes) {
                    Ok(wire) => {
                        if inbound_tx.send(wire).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(peer = %reader_peer, error = %e, "Discarding undecodable frame")
                    }
                },
                Err(e) => {
                    warn!(peer = %reader_peer, error = %e, "Link read failed");
                    break;
                }
            }
        }
        debug!(peer = %reader_peer, reason = ?quic.close_reason(), "Link reader finished");
    });

    Connection::new(remote, direction, outbound_tx, inbound_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_target_is_canonical_endpoint_id() {
        let id = SecretKey::generate(&mut rand::rng()).public();
        let canonical = id.to_string();

        let parsed = parse_endpoint_id(&PeerId::new(format!(" {} ", canonical))).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_garbage_peer_id_rejected() {
        let err = parse_endpoint_id(&PeerId::new("not-a-key")).unwrap_err();
        assert!(matches!(err, MeshError::InvalidPeerId(msg) if msg.starts_with("not-a-key")));
    }
}
