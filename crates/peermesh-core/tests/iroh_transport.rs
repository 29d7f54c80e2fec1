//! Iroh Transport End-to-End Tests
//!
//! These tests bind real iroh endpoints and exchange envelopes over QUIC.
//! They need working networking (direct addresses on localhost are enough
//! once each side's address is seeded into static discovery), so they are
//! ignored by default:
//!
//! ```bash
//! cargo test -p peermesh-core --test iroh_transport -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use peermesh_core::{IrohTransport, MeshConfig, MeshNode, PeerId, Role, Transport};
use tokio::time::sleep;

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    for _ in 0..300 {
        if done() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_two_iroh_nodes_negotiate_and_chat() {
    let config = MeshConfig::default();
    let leader_transport = Arc::new(IrohTransport::bind(&config).await.unwrap());
    let follower_transport = Arc::new(IrohTransport::bind(&config).await.unwrap());

    // Seed addresses so the dial does not depend on external discovery
    follower_transport.add_peer_addr(leader_transport.endpoint_addr());
    leader_transport.add_peer_addr(follower_transport.endpoint_addr());

    let leader_id = leader_transport.local_peer_id().clone();
    let leader = MeshNode::start(leader_transport.clone()).unwrap();
    let follower = MeshNode::start(follower_transport.clone()).unwrap();

    follower.connect(leader_id.clone()).unwrap();
    wait_until("link registered on both sides", || {
        leader.peer_ids().len() == 1 && follower.peer_ids().len() == 1
    })
    .await;

    assert_eq!(leader.role(), Role::Leader);
    assert_eq!(follower.role(), Role::Follower);
    assert_eq!(follower.peer_ids(), vec![leader_id]);

    let sent = follower.send_message("over quic").await.unwrap();
    wait_until("message delivered", || leader.messages() == vec![sent.clone()]).await;

    let reply = leader.send_message("ack").await.unwrap();
    wait_until("reply delivered", || follower.messages().contains(&reply)).await;

    leader.shutdown();
    follower.shutdown();
    leader_transport.shutdown().await;
    follower_transport.shutdown().await;
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_dial_with_invalid_id_reports_error() {
    let transport = Arc::new(IrohTransport::bind(&MeshConfig::default()).await.unwrap());
    let node = MeshNode::start(transport.clone()).unwrap();
    let mut events = node.subscribe();

    node.connect(PeerId::new("not-an-endpoint-id")).unwrap();

    let event = loop {
        let event = events.recv().await.unwrap();
        if let peermesh_core::MeshEvent::TransportError { .. } = event {
            break event;
        }
    };
    assert_eq!(event.peer_id(), Some(&PeerId::new("not-an-endpoint-id")));
    assert!(node.peer_ids().is_empty());

    transport.shutdown().await;
}
