//! Gossip-based peer discovery
//!
//! ```text
//!        Leader                         Follower
//!          │  incoming X                   │
//!          │  peer_ids() = [A, B, X]       │
//!          ├──── peer-ids [A, B, X] ──────▶│
//!          │                               │  U = [A, B, X] \ (known ∪ self)
//!          │                               │  dial each id in U
//! ```
//!
//! The leader announces on every incoming connection after its first; a
//! follower dials whatever it has not seen yet. Over time every follower
//! links to every other, so the mesh becomes fully connected.

use std::collections::HashSet;

use crate::mesh::envelope::Envelope;
use crate::mesh::registry::ConnectionRegistry;
use crate::types::PeerId;

/// The gossip envelope the leader sends: every registered peer, in order
pub fn announce(registry: &ConnectionRegistry) -> Envelope {
    Envelope::PeerIds(registry.peer_ids())
}

/// Ids in `advertised` that are neither `local` nor already `known`.
///
/// Keeps the order of `advertised` and drops repeats within it.
pub fn undiscovered(advertised: &[PeerId], known: &[PeerId], local: &PeerId) -> Vec<PeerId> {
    let mut seen: HashSet<&PeerId> = known.iter().collect();
    seen.insert(local);

    let mut out = Vec::new();
    for id in advertised {
        if seen.insert(id) {
            out.push(id.clone());
        }
    }
    out
}
