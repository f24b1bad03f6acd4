//! Integration tests for the in-memory rendezvous hub.

use std::time::Duration;

use peerboard_transport::{
    retry, MemoryRendezvous, PeerId, Rendezvous, RendezvousEvent,
    RendezvousOutbound, RetryPolicy, TransportError,
};
use tokio::sync::mpsc;

async fn next(rx: &mut mpsc::UnboundedReceiver<RendezvousEvent>) -> RendezvousEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

#[tokio::test]
async fn test_join_notifies_both_sides() {
    let hub = MemoryRendezvous::new();
    let a = hub.endpoint_with_id(PeerId::from("a"));
    let b = hub.endpoint_with_id(PeerId::from("b"));

    let mut ca = a.join("lobby").await.unwrap();
    let mut cb = b.join("lobby").await.unwrap();

    assert_eq!(next(&mut ca.inbound).await, RendezvousEvent::PeerJoined("b".into()));
    assert_eq!(next(&mut cb.inbound).await, RendezvousEvent::PeerJoined("a".into()));
    assert_eq!(hub.members("lobby"), vec![PeerId::from("a"), PeerId::from("b")]);
}

#[tokio::test]
async fn test_targeted_send_reaches_only_target() {
    let hub = MemoryRendezvous::new();
    let mut a = hub.endpoint_with_id("a".into()).join("r").await.unwrap();
    let mut b = hub.endpoint_with_id("b".into()).join("r").await.unwrap();
    let mut c = hub.endpoint_with_id("c".into()).join("r").await.unwrap();
    // Drain join notifications.
    next(&mut a.inbound).await;
    next(&mut a.inbound).await;
    next(&mut b.inbound).await;
    next(&mut b.inbound).await;
    next(&mut c.inbound).await;
    next(&mut c.inbound).await;

    a.outbound
        .send(RendezvousOutbound {
            target: Some("c".into()),
            bytes: b"psst".to_vec(),
        })
        .unwrap();

    assert_eq!(
        next(&mut c.inbound).await,
        RendezvousEvent::Data { from: "a".into(), bytes: b"psst".to_vec() }
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(50), b.inbound.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_dropping_outbound_leaves_room() {
    let hub = MemoryRendezvous::new();
    let a = hub.endpoint_with_id("a".into()).join("r").await.unwrap();
    let mut b = hub.endpoint_with_id("b".into()).join("r").await.unwrap();
    next(&mut b.inbound).await;

    drop(a);
    assert_eq!(next(&mut b.inbound).await, RendezvousEvent::PeerLeft("a".into()));
    assert_eq!(hub.members("r"), vec![PeerId::from("b")]);
}

#[tokio::test]
async fn test_unsupported_hub_rejects_join() {
    let hub = MemoryRendezvous::new();
    hub.set_supported(false);
    let ep = hub.endpoint();
    assert!(!ep.is_supported());
    assert!(matches!(ep.join("r").await, Err(TransportError::Unsupported(_))));
}

#[tokio::test(start_paused = true)]
async fn test_injected_failures_recover_under_backoff() {
    let hub = MemoryRendezvous::new();
    hub.fail_next_joins(2);
    let ep = hub.endpoint();
    let channel = retry::with_backoff(&RetryPolicy::default(), |_| ep.join("r")).await;
    assert!(channel.is_ok());
}
