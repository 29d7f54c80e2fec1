//! A running mesh node: two event loops over one shared state
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  MeshNode                                                       │
//! │  ├── connection loop: mpsc<Connection>                          │
//! │  │   └── register, wire inbound forwarder, react (role/gossip)  │
//! │  ├── data loop: mpsc<DataEvent>                                 │
//! │  │   ├── Inbound: message → log, peer-ids → dial undiscovered   │
//! │  │   └── Send: local message → broadcast + log                  │
//! │  ├── state: Arc<RwLock<MeshState>> (written only by the loops)  │
//! │  └── event_tx: broadcast::Sender<MeshEvent>                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each loop handles one item at a time and never awaits while holding the
//! state lock, so there is a single writer at any moment. Local sends go
//! through the data loop so that local and remote messages are appended to
//! the log at the same ordering point.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chat::Message;
use crate::error::{MeshError, MeshResult};
use crate::mesh::envelope::WireEnvelope;
use crate::mesh::events::MeshEvent;
use crate::mesh::role::Role;
use crate::mesh::state::{Inbound, MeshState, Reaction};
use crate::transport::{Connection, Transport, TransportSink};
use crate::types::PeerId;

/// Default capacity for the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Items consumed by the data loop
enum DataEvent {
    /// An envelope arrived on the connection to `from`
    Inbound { from: PeerId, envelope: WireEnvelope },
    /// Broadcast and log a local message
    Send {
        body: String,
        reply: oneshot::Sender<MeshResult<Message>>,
    },
}

/// Point-in-time view of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshSnapshot {
    /// This node's id
    pub local_id: PeerId,
    /// Current role
    pub role: Role,
    /// Registered peers, in registration order (may repeat)
    pub peers: Vec<PeerId>,
    /// The message log
    pub messages: Vec<Message>,
}

impl MeshSnapshot {
    /// Registered peers with repeats removed, sorted
    pub fn distinct_peers(&self) -> Vec<PeerId> {
        let mut peers = self.peers.clone();
        peers.sort();
        peers.dedup();
        peers
    }
}

/// Handle to a running mesh node
///
/// # Example
///
/// ```ignore
/// let network = MemoryNetwork::new();
/// let leader = MeshNode::start(Arc::new(network.transport("leader")))?;
/// let follower = MeshNode::start(Arc::new(network.transport("follower")))?;
///
/// follower.connect(leader.local_id().clone())?;
/// follower.send_message("hello").await?;
/// ```
pub struct MeshNode {
    local: PeerId,
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<MeshState>>,
    sink: TransportSink,
    data_tx: mpsc::UnboundedSender<DataEvent>,
    event_tx: broadcast::Sender<MeshEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MeshNode {
    /// Start listening on `transport` and spawn both event loops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(transport: Arc<dyn Transport>) -> MeshResult<Self> {
        let local = transport.local_peer_id().clone();
        if local.is_empty() {
            return Err(MeshError::InvalidPeerId("local peer id is empty".to_string()));
        }

        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sink = TransportSink::new(conn_tx, event_tx.clone());
        let state = Arc::new(RwLock::new(MeshState::new(local.clone())));

        transport.listen(sink.clone())?;

        let connection_task = tokio::spawn(connection_loop(
            local.clone(),
            state.clone(),
            conn_rx,
            data_tx.clone(),
            event_tx.clone(),
        ));
        let data_task = tokio::spawn(data_loop(
            local.clone(),
            state.clone(),
            data_rx,
            transport.clone(),
            sink.clone(),
            event_tx.clone(),
        ));

        info!(node = %local, "Mesh node started");

        Ok(Self {
            local,
            transport,
            state,
            sink,
            data_tx,
            event_tx,
            tasks: Mutex::new(vec![connection_task, data_task]),
        })
    }

    /// This node's id
    pub fn local_id(&self) -> &PeerId {
        &self.local
    }

    /// Open an outgoing connection to `remote`.
    ///
    /// Returns once the attempt is handed to the transport. The connection
    /// is registered when it opens; failures surface as
    /// [`MeshEvent::TransportError`].
    pub fn connect(&self, remote: PeerId) -> MeshResult<()> {
        if remote.is_empty() {
            return Err(MeshError::InvalidPeerId("peer id is empty".to_string()));
        }
        if remote == self.local {
            return Err(MeshError::InvalidPeerId(format!(
                "{} is this node's own id",
                remote
            )));
        }
        if self.data_tx.is_closed() {
            return Err(MeshError::NodeStopped);
        }
        dial(self.transport.as_ref(), &self.sink, &self.event_tx, remote);
        Ok(())
    }

    /// Broadcast a message to every connection and append it to the log
    pub async fn send_message(&self, body: impl Into<String>) -> MeshResult<Message> {
        let (reply, rx) = oneshot::channel();
        self.data_tx
            .send(DataEvent::Send {
                body: body.into(),
                reply,
            })
            .map_err(|_| MeshError::NodeStopped)?;
        rx.await.map_err(|_| MeshError::NodeStopped)?
    }

    /// Current role
    pub fn role(&self) -> Role {
        self.state.read().role()
    }

    /// Registered peers, in registration order
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.state.read().peer_ids()
    }

    /// Copy of the message log
    pub fn messages(&self) -> Vec<Message> {
        self.state.read().log().entries().to_vec()
    }

    /// Consistent view of role, peers and log
    pub fn snapshot(&self) -> MeshSnapshot {
        let state = self.state.read();
        MeshSnapshot {
            local_id: self.local.clone(),
            role: state.role(),
            peers: state.peer_ids(),
            messages: state.log().entries().to_vec(),
        }
    }

    /// Subscribe to mesh events
    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.event_tx.subscribe()
    }

    /// Stop both event loops. Later calls return [`MeshError::NodeStopped`].
    pub fn shutdown(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        info!(node = %self.local, "Shutting down mesh node");
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for MeshNode {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for MeshNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshNode")
            .field("local", &self.local)
            .field("role", &self.role())
            .field("peers", &self.peer_ids().len())
            .finish()
    }
}

fn dial(
    transport: &dyn Transport,
    sink: &TransportSink,
    event_tx: &broadcast::Sender<MeshEvent>,
    remote: PeerId,
) {
    debug!(peer = %remote, "Starting outgoing connection");
    let _ = event_tx.send(MeshEvent::DialStarted {
        peer_id: remote.clone(),
    });
    transport.dial(remote, sink.clone());
}

/// Push every envelope from one connection onto the data queue
fn spawn_forwarder(
    from: PeerId,
    mut inbound: mpsc::UnboundedReceiver<WireEnvelope>,
    data_tx: mpsc::UnboundedSender<DataEvent>,
) {
    tokio::spawn(async move {
        while let Some(envelope) = inbound.recv().await {
            let event = DataEvent::Inbound {
                from: from.clone(),
                envelope,
            };
            if data_tx.send(event).is_err() {
                break;
            }
        }
        debug!(peer = %from, "Inbound stream ended");
    });
}

async fn connection_loop(
    local: PeerId,
    state: Arc<RwLock<MeshState>>,
    mut connections: mpsc::UnboundedReceiver<Connection>,
    data_tx: mpsc::UnboundedSender<DataEvent>,
    event_tx: broadcast::Sender<MeshEvent>,
) {
    debug!(node = %local, "Connection loop started");

    while let Some(mut connection) = connections.recv().await {
        let remote = connection.remote_peer_id().clone();
        let direction = connection.direction();
        let inbound = connection.take_inbound();

        let (reaction, peer_count) = {
            let mut state = state.write();
            state.register(connection);
            match inbound {
                Some(inbound) => spawn_forwarder(remote.clone(), inbound, data_tx.clone()),
                None => warn!(peer = %remote, "Inbound stream already taken, not forwarding"),
            }
            (state.react(direction, &remote), state.registry().len())
        };

        let _ = event_tx.send(MeshEvent::PeerConnected {
            peer_id: remote.clone(),
            direction,
            peer_count,
        });

        match reaction {
            Ok(Reaction::RoleDecided(role)) => {
                let _ = event_tx.send(MeshEvent::RoleChanged { role });
            }
            Ok(Reaction::Gossiped { peers, recipients }) => {
                let _ = event_tx.send(MeshEvent::GossipSent { peers, recipients });
            }
            Ok(Reaction::None) => {}
            Err(e) => error!(peer = %remote, error = %e, "Failed to react to connection"),
        }
    }

    debug!(node = %local, "Connection loop finished");
}

async fn data_loop(
    local: PeerId,
    state: Arc<RwLock<MeshState>>,
    mut events: mpsc::UnboundedReceiver<DataEvent>,
    transport: Arc<dyn Transport>,
    sink: TransportSink,
    event_tx: broadcast::Sender<MeshEvent>,
) {
    debug!(node = %local, "Data loop started");

    while let Some(event) = events.recv().await {
        match event {
            DataEvent::Inbound { from, envelope } => {
                let outcome = state.write().handle_envelope(&from, envelope);
                match outcome {
                    Ok(Inbound::Delivered(message)) => {
                        let _ = event_tx.send(MeshEvent::MessageReceived { message });
                    }
                    Ok(Inbound::PeerList {
                        peers,
                        undiscovered,
                    }) => {
                        let _ = event_tx.send(MeshEvent::PeerListReceived {
                            from: from.clone(),
                            peers,
                            undiscovered: undiscovered.clone(),
                        });
                        for remote in undiscovered {
                            dial(transport.as_ref(), &sink, &event_tx, remote);
                        }
                    }
                    Ok(Inbound::PeerListIgnored) => {}
                    Err(e) => {
                        match &e {
                            MeshError::UnknownEnvelopeKind(kind) => {
                                warn!(peer = %from, %kind, "Discarding envelope of unknown kind")
                            }
                            _ => error!(peer = %from, error = %e, "Rejected inbound envelope"),
                        }
                        let _ = event_tx.send(MeshEvent::EnvelopeRejected {
                            from,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            DataEvent::Send { body, reply } => {
                let result = state.write().send_message(body);
                let result = result.map(|(message, recipients)| {
                    let _ = event_tx.send(MeshEvent::MessageSent {
                        message: message.clone(),
                        recipients,
                    });
                    message
                });
                if let Err(e) = &result {
                    warn!(error = %e, "Local message rejected");
                }
                let _ = reply.send(result);
            }
        }
    }

    debug!(node = %local, "Data loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryNetwork;
    use std::time::Duration;

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_two_nodes_settle_roles() {
        let network = MemoryNetwork::new();
        let leader = MeshNode::start(Arc::new(network.transport("leader"))).unwrap();
        let follower = MeshNode::start(Arc::new(network.transport("follower"))).unwrap();

        follower.connect(PeerId::new("leader")).unwrap();

        wait_until(|| leader.role() == Role::Leader && follower.role() == Role::Follower).await;
        assert_eq!(leader.peer_ids(), vec![PeerId::new("follower")]);
        assert_eq!(follower.peer_ids(), vec![PeerId::new("leader")]);
    }

    #[tokio::test]
    async fn test_connect_to_self_rejected() {
        let network = MemoryNetwork::new();
        let node = MeshNode::start(Arc::new(network.transport("me"))).unwrap();
        assert!(matches!(
            node.connect(PeerId::new("me")),
            Err(MeshError::InvalidPeerId(_))
        ));
        assert!(matches!(
            node.connect(PeerId::new("")),
            Err(MeshError::InvalidPeerId(_))
        ));
    }

    #[tokio::test]
    async fn test_send_alone_appends_once() {
        let network = MemoryNetwork::new();
        let node = MeshNode::start(Arc::new(network.transport("me"))).unwrap();

        let message = node.send_message("hello").await.unwrap();
        assert_eq!(message, Message::new("hello", PeerId::new("me"), vec![]));
        assert_eq!(node.messages(), vec![message]);
        assert_eq!(node.role(), Role::Undecided);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let network = MemoryNetwork::new();
        let node = MeshNode::start(Arc::new(network.transport("me"))).unwrap();
        node.shutdown();
        tokio::task::yield_now().await;

        assert!(matches!(
            node.send_message("late").await,
            Err(MeshError::NodeStopped)
        ));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_state() {
        let network = MemoryNetwork::new();
        let a = MeshNode::start(Arc::new(network.transport("a"))).unwrap();
        let b = MeshNode::start(Arc::new(network.transport("b"))).unwrap();
        b.connect(PeerId::new("a")).unwrap();
        wait_until(|| a.peer_ids().len() == 1).await;

        b.send_message("hi").await.unwrap();
        wait_until(|| a.messages().len() == 1).await;

        let snapshot = a.snapshot();
        assert_eq!(snapshot.local_id, PeerId::new("a"));
        assert_eq!(snapshot.role, Role::Leader);
        assert_eq!(snapshot.peers, vec![PeerId::new("b")]);
        assert_eq!(snapshot.messages[0].body(), "hi");
        assert_eq!(snapshot.messages[0].to(), &[PeerId::new("a")][..]);
    }

    #[tokio::test]
    async fn test_connection_without_inbound_still_registered() {
        let network = MemoryNetwork::new();
        let node = MeshNode::start(Arc::new(network.transport("me"))).unwrap();
        let mut events = node.subscribe();

        let (mut ghost_side, mut our_side) =
            Connection::pair(&PeerId::new("ghost"), &PeerId::new("me"));
        let _taken = our_side.take_inbound().unwrap();
        node.sink.opened(our_side);

        let role = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let MeshEvent::RoleChanged { role } = events.recv().await.unwrap() {
                    return role;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(role, Role::Leader);
        assert_eq!(node.peer_ids(), vec![PeerId::new("ghost")]);

        // The loop keeps going: the next link is registered and gossiped
        let b = MeshNode::start(Arc::new(network.transport("b"))).unwrap();
        b.connect(PeerId::new("me")).unwrap();
        wait_until(|| node.peer_ids().len() == 2).await;
        assert_eq!(node.peer_ids(), vec![PeerId::new("ghost"), PeerId::new("b")]);

        let mut ghost_in = ghost_side.take_inbound().unwrap();
        let gossip = tokio::time::timeout(Duration::from_secs(2), ghost_in.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gossip.kind, "peer-ids");
        assert_eq!(node.role(), Role::Leader);
    }

    #[test]
    fn test_distinct_peers() {
        let snapshot = MeshSnapshot {
            local_id: PeerId::new("me"),
            role: Role::Follower,
            peers: vec![PeerId::new("c"), PeerId::new("a"), PeerId::new("c")],
            messages: vec![],
        };
        assert_eq!(snapshot.distinct_peers(), vec![PeerId::new("a"), PeerId::new("c")]);
    }
}
