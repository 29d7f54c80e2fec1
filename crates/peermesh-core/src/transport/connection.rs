//! Transport-agnostic handle to one live link

use std::fmt;

use tokio::sync::mpsc;

use crate::error::{MeshError, MeshResult};
use crate::mesh::envelope::{Envelope, WireEnvelope};
use crate::types::{Direction, PeerId};

/// A live duplex link to exactly one remote peer.
///
/// Transports produce `Connection`s; the connection event loop registers
/// them. Outbound envelopes go through an unbounded channel so sending
/// never blocks the loop that calls it. The inbound receiver is taken
/// exactly once, when the connection is wired into the data event loop.
pub struct Connection {
    remote: PeerId,
    direction: Direction,
    outbound: mpsc::UnboundedSender<WireEnvelope>,
    inbound: Option<mpsc::UnboundedReceiver<WireEnvelope>>,
}

impl Connection {
    /// Assemble a connection from a transport's channel ends
    pub fn new(
        remote: PeerId,
        direction: Direction,
        outbound: mpsc::UnboundedSender<WireEnvelope>,
        inbound: mpsc::UnboundedReceiver<WireEnvelope>,
    ) -> Self {
        Self {
            remote,
            direction,
            outbound,
            inbound: Some(inbound),
        }
    }

    /// Build both ends of an in-process link from `dialer` to `acceptor`.
    ///
    /// Returns `(dialer_side, acceptor_side)`: the dialer's view is
    /// `Outgoing` towards `acceptor`, the acceptor's view is `Incoming`
    /// from `dialer`.
    pub fn pair(dialer: &PeerId, acceptor: &PeerId) -> (Connection, Connection) {
        let (to_acceptor, acceptor_inbound) = mpsc::unbounded_channel();
        let (to_dialer, dialer_inbound) = mpsc::unbounded_channel();

        let dialer_side = Connection::new(
            acceptor.clone(),
            Direction::Outgoing,
            to_acceptor,
            dialer_inbound,
        );
        let acceptor_side = Connection::new(
            dialer.clone(),
            Direction::Incoming,
            to_dialer,
            acceptor_inbound,
        );
        (dialer_side, acceptor_side)
    }

    /// Peer on the other end of the link
    pub fn remote_peer_id(&self) -> &PeerId {
        &self.remote
    }

    /// Who initiated the link
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Send a typed envelope
    pub fn send(&self, envelope: &Envelope) -> MeshResult<()> {
        self.send_wire(envelope.to_wire()?)
    }

    /// Send an already-encoded envelope
    pub fn send_wire(&self, wire: WireEnvelope) -> MeshResult<()> {
        self.outbound
            .send(wire)
            .map_err(|_| MeshError::ConnectionClosed(self.remote.clone()))
    }

    /// Take the inbound stream. Returns `None` if it was already taken.
    pub fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<WireEnvelope>> {
        self.inbound.take()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .field("direction", &self.direction)
            .field("inbound_taken", &self.inbound.is_none())
            .finish()
    }
}
