//! In-process transport
//!
//! A [`MemoryNetwork`] plays the part of the signaling server: peers
//! register under their [`PeerId`] when they start listening, and a dial
//! looks the target up by id. Links are plain channel pairs, so every
//! envelope arrives in order and nothing touches the network.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{Connection, Transport, TransportSink};
use crate::error::{MeshError, MeshResult};
use crate::types::PeerId;

/// Shared registry of listening in-process peers
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<PeerId, TransportSink>>>,
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport for `local` attached to this network
    pub fn transport(&self, local: impl Into<PeerId>) -> MemoryTransport {
        MemoryTransport {
            local: local.into(),
            network: self.clone(),
        }
    }

    /// Number of listening peers
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// One peer's view of a [`MemoryNetwork`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    local: PeerId,
    network: MemoryNetwork,
}

impl Transport for MemoryTransport {
    fn local_peer_id(&self) -> &PeerId {
        &self.local
    }

    fn listen(&self, sink: TransportSink) -> MeshResult<()> {
        let mut listeners = self.network.listeners.lock();
        if listeners.contains_key(&self.local) {
            return Err(MeshError::Transport(format!(
                "peer id {} is already listening",
                self.local
            )));
        }
        listeners.insert(self.local.clone(), sink);
        debug!(peer = %self.local, "Listening on memory network");
        Ok(())
    }

    fn dial(&self, remote: PeerId, sink: TransportSink) {
        let target = self.network.listeners.lock().get(&remote).cloned();
        match target {
            Some(remote_sink) => {
                let (ours, theirs) = Connection::pair(&self.local, &remote);
                remote_sink.opened(theirs);
                sink.opened(ours);
                debug!(from = %self.local, to = %remote, "Memory link opened");
            }
            None => sink.connection_failed(&remote, "peer is not on the memory network"),
        }
    }
}
