//! Integration tests for rooms over both carriers, using the in-memory
//! transports.

use std::time::Duration;

use peerboard_protocol::{PeerId, RoomId};
use peerboard_room::framed::{LINK_MAX_CHUNK, SERVICE_ID, UNKNOWN_PEER};
use peerboard_room::{
    ActionReceiver, FramedLinkCarrier, Inbound, RendezvousCarrier, Room, RoomConfig,
    RoomError, RoomRegistry,
};
use peerboard_transport::{
    memory_link_pair, MemoryDiscovery, MemoryRendezvous, RetryPolicy, TransportError,
};
use serde_json::json;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(2);

async fn rendezvous_room(hub: &MemoryRendezvous, id: &str, room: &str) -> Room {
    let endpoint = hub.endpoint_with_id(PeerId::from(id));
    let (carrier, events) =
        RendezvousCarrier::join(&endpoint, &RoomId::from(room), &RetryPolicy::none())
            .await
            .unwrap();
    Room::spawn(RoomId::from(room), carrier, events, &RoomConfig::default())
}

async fn wait_for_peers(room: &Room, n: usize) -> Vec<PeerId> {
    tokio::time::timeout(WAIT, async {
        loop {
            let peers = room.peers().await;
            if peers.len() == n {
                return peers;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("peer count never reached")
}

async fn next(rx: &mut ActionReceiver) -> Inbound {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out")
        .expect("room closed")
}

async fn next_event<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

async fn nothing_within<T: std::fmt::Debug>(fut: impl std::future::Future<Output = T>) {
    let r = tokio::time::timeout(Duration::from_millis(50), fut).await;
    assert!(r.is_err(), "expected nothing, got {r:?}");
}

// =========================================================================
// Rendezvous carrier
// =========================================================================

#[tokio::test]
async fn test_broadcast_reaches_other_peer_with_sender_id() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "lobby").await;
    let b = rendezvous_room(&hub, "b", "lobby").await;
    wait_for_peers(&a, 1).await;
    wait_for_peers(&b, 1).await;

    let (_send_b, mut recv_b) = b.make_action("chat").await.unwrap();
    let (send_a, _recv_a) = a.make_action("chat").await.unwrap();
    send_a.send(&json!({"text": "hi"}), None).await;

    let msg = next(&mut recv_b).await;
    assert_eq!(msg.payload, json!({"text": "hi"}));
    assert_eq!(msg.from, PeerId::from("a"));
    assert_eq!(a.local_id(), &PeerId::from("a"));
}

#[tokio::test]
async fn test_send_without_peers_is_noop_and_later_joiner_still_hears() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let (send_a, _) = a.make_action("ping").await.unwrap();

    // Nobody to hear this one.
    assert!(a.peers().await.is_empty());
    send_a.send(&json!(1), None).await;

    let b = rendezvous_room(&hub, "b", "r").await;
    let (_, mut recv_b) = b.make_action("ping").await.unwrap();
    wait_for_peers(&a, 1).await;

    send_a.send(&json!(2), None).await;
    assert_eq!(next(&mut recv_b).await.payload, json!(2));
    nothing_within(recv_b.recv()).await;
}

#[tokio::test]
async fn test_targeted_send_to_absent_peer_is_noop() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let _b = rendezvous_room(&hub, "b", "r").await;
    wait_for_peers(&a, 1).await;
    let (send_a, _) = a.make_action("ping").await.unwrap();

    send_a.send(&json!("early"), Some(&PeerId::from("c"))).await;

    let c = rendezvous_room(&hub, "c", "r").await;
    let (_, mut recv_c) = c.make_action("ping").await.unwrap();
    wait_for_peers(&a, 2).await;
    send_a.send(&json!("late"), Some(&PeerId::from("c"))).await;
    assert_eq!(next(&mut recv_c).await.payload, json!("late"));
    nothing_within(recv_c.recv()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_join_observer_sees_every_later_join() {
    for round in 0..50 {
        let hub = MemoryRendezvous::new();
        let room = format!("r{round}");
        let a = rendezvous_room(&hub, "a", &room).await;
        let mut joins = a.on_peer_join().await.unwrap();
        let _b = rendezvous_room(&hub, "b", &room).await;
        assert_eq!(next_event(&mut joins).await, PeerId::from("b"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_action_hears_messages_sent_right_after() {
    for round in 0..50 {
        let hub = MemoryRendezvous::new();
        let room = format!("r{round}");
        let a = rendezvous_room(&hub, "a", &room).await;
        let b = rendezvous_room(&hub, "b", &room).await;
        wait_for_peers(&b, 1).await;

        let (_, mut recv_a) = a.make_action("ping").await.unwrap();
        let (send_b, _) = b.make_action("ping").await.unwrap();
        send_b.send(&json!(round), None).await;
        assert_eq!(next(&mut recv_a).await.payload, json!(round));
    }
}

#[tokio::test]
async fn test_same_action_twice_adds_listeners_in_order() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let b = rendezvous_room(&hub, "b", "r").await;
    wait_for_peers(&a, 1).await;

    let (_, mut first) = b.make_action("move").await.unwrap();
    let (_, mut second) = b.make_action("move").await.unwrap();
    let (send, _) = a.make_action("move").await.unwrap();
    send.send(&json!("x"), None).await;
    send.send(&json!("y"), None).await;

    assert_eq!(next(&mut first).await.payload, json!("x"));
    assert_eq!(next(&mut first).await.payload, json!("y"));
    assert_eq!(next(&mut second).await.payload, json!("x"));
    assert_eq!(next(&mut second).await.payload, json!("y"));
}

#[tokio::test]
async fn test_targeted_send_reaches_only_target() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let b = rendezvous_room(&hub, "b", "r").await;
    let c = rendezvous_room(&hub, "c", "r").await;
    wait_for_peers(&a, 2).await;

    let (_, mut recv_b) = b.make_action("challenge").await.unwrap();
    let (_, mut recv_c) = c.make_action("challenge").await.unwrap();
    let (send, _) = a.make_action("challenge").await.unwrap();
    send.send(&json!({"gameId": "g1"}), Some(&PeerId::from("c"))).await;

    assert_eq!(next(&mut recv_c).await.payload["gameId"], "g1");
    nothing_within(recv_b.recv()).await;
}

#[tokio::test]
async fn test_peer_join_and_leave_observers() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let mut joins = a.on_peer_join().await.unwrap();
    let mut leaves = a.on_peer_leave().await.unwrap();

    let b = rendezvous_room(&hub, "b", "r").await;
    assert_eq!(next_event(&mut joins).await, PeerId::from("b"));
    assert_eq!(a.peers().await, vec![PeerId::from("b")]);

    b.leave().await;
    assert_eq!(next_event(&mut leaves).await, Some(PeerId::from("b")));
    assert!(a.peers().await.is_empty());
}

#[tokio::test]
async fn test_leave_detaches_listeners_and_silences_sends() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let b = rendezvous_room(&hub, "b", "r").await;
    wait_for_peers(&b, 1).await;
    let (send_a, mut recv_a) = a.make_action("chat").await.unwrap();

    a.leave().await;
    a.leave().await;
    assert!(a.is_closed());
    assert!(recv_a.recv().await.is_none());
    assert!(a.peers().await.is_empty());
    send_a.send(&json!("late"), None).await;
    assert!(matches!(a.make_action("chat").await, Err(RoomError::Closed(_))));
}

#[tokio::test]
async fn test_dropping_every_handle_leaves_room() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    let b = rendezvous_room(&hub, "b", "r").await;
    let mut leaves = b.on_peer_leave().await.unwrap();
    wait_for_peers(&b, 1).await;

    drop(a);
    assert_eq!(next_event(&mut leaves).await, Some(PeerId::from("a")));
}

#[tokio::test]
async fn test_bad_action_name_is_rejected() {
    let hub = MemoryRendezvous::new();
    let a = rendezvous_room(&hub, "a", "r").await;
    assert!(matches!(
        a.make_action("challengeResponse").await,
        Err(RoomError::Protocol(_))
    ));
}

// =========================================================================
// Framed link carrier
// =========================================================================

fn framed_pair(read_size: Option<usize>) -> (Room, Room) {
    let (left, right) = memory_link_pair(LINK_MAX_CHUNK);
    let right = match read_size {
        Some(n) => right.with_read_size(n),
        None => right,
    };
    let (ca, ea) = FramedLinkCarrier::with_local_id(left, PeerId::from("left"));
    let (cb, eb) = FramedLinkCarrier::with_local_id(right, PeerId::from("right"));
    let cfg = RoomConfig::default();
    (
        Room::spawn(RoomId::from("ble"), ca, ea, &cfg),
        Room::spawn(RoomId::from("ble"), cb, eb, &cfg),
    )
}

#[tokio::test]
async fn test_framed_identity_resolves_from_first_id_payload() {
    let (a, b) = framed_pair(None);
    let mut joins = b.on_peer_join().await.unwrap();
    let (_, mut recv_b) = b.make_action("hello").await.unwrap();
    let (send_a, _) = a.make_action("hello").await.unwrap();

    // No identity yet: delivered, but attributed to the placeholder.
    send_a.send(&json!({"text": "anon"}), None).await;
    assert_eq!(next(&mut recv_b).await.from, PeerId::from(UNKNOWN_PEER));
    assert!(b.peers().await.is_empty());

    send_a.send(&json!({"peerId": "left"}), None).await;
    assert_eq!(next_event(&mut joins).await, PeerId::from("left"));
    assert_eq!(next(&mut recv_b).await.from, PeerId::from("left"));
    assert_eq!(b.peers().await, vec![PeerId::from("left")]);
}

#[tokio::test]
async fn test_framed_large_payload_survives_single_byte_reads() {
    let (a, b) = framed_pair(Some(1));
    let (_, mut recv_b) = b.make_action("logSync").await.unwrap();
    let (send_a, _) = a.make_action("logSync").await.unwrap();

    let big: Vec<String> = (0..200).map(|i| format!("entry-{i}")).collect();
    let payload = json!({"id": "left", "events": big});
    send_a.send(&payload, None).await;
    send_a.send(&json!({"id": "left", "n": 2}), None).await;

    assert_eq!(next(&mut recv_b).await.payload, payload);
    assert_eq!(next(&mut recv_b).await.payload["n"], 2);
}

#[tokio::test]
async fn test_framed_write_failure_tears_down_immediately() {
    let (left, right) = memory_link_pair(LINK_MAX_CHUNK);
    let fault = left.write_fault();
    let (ca, ea) = FramedLinkCarrier::new(left);
    let (cb, eb) = FramedLinkCarrier::new(right);
    let cfg = RoomConfig::default();
    let a = Room::spawn(RoomId::from("ble"), ca, ea, &cfg);
    let b = Room::spawn(RoomId::from("ble"), cb, eb, &cfg);

    // Let `a` learn who `b` is.
    let (send_b, _) = b.make_action("heartbeat").await.unwrap();
    send_b.send(&json!({"id": "bee"}), None).await;
    wait_for_peers(&a, 1).await;
    let mut leaves = a.on_peer_leave().await.unwrap();

    fault.trigger();
    let (send_a, _) = a.make_action("heartbeat").await.unwrap();
    send_a.send(&json!({"id": "ay"}), None).await;

    assert!(a.peers().await.is_empty());
    assert_eq!(next_event(&mut leaves).await, Some(PeerId::from("bee")));
    send_a.send(&json!({"id": "ay"}), None).await;
    nothing_within(leaves.recv()).await;
}

#[tokio::test]
async fn test_framed_remote_close_reports_unresolved_leave() {
    let (a, b) = framed_pair(None);
    let mut leaves = b.on_peer_leave().await.unwrap();
    a.leave().await;
    assert_eq!(next_event(&mut leaves).await, None);
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_registry_reuses_open_room() {
    let hub = MemoryRendezvous::new();
    let ep = hub.endpoint();
    let mut registry = RoomRegistry::new(RoomConfig::default());

    let first = registry.join_rendezvous(&ep, RoomId::from("lobby")).await.unwrap();
    let second = registry.join_rendezvous(&ep, RoomId::from("lobby")).await.unwrap();
    assert_eq!(first.local_id(), second.local_id());
    assert_eq!(registry.len(), 1);
    assert_eq!(hub.members("lobby").len(), 1);

    assert!(registry.leave(&RoomId::from("lobby")).await);
    assert!(first.is_closed());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_forgets_rooms_left_through_their_handle() {
    let hub = MemoryRendezvous::new();
    let ep = hub.endpoint();
    let mut registry = RoomRegistry::new(RoomConfig::default());

    let lobby = registry.join_rendezvous(&ep, RoomId::from("lobby")).await.unwrap();
    registry.join_rendezvous(&ep, RoomId::from("g1")).await.unwrap();
    lobby.leave().await;

    assert_eq!(registry.ids(), vec![RoomId::from("g1")]);
    assert_eq!(registry.len(), 1);
    assert!(!registry.leave(&RoomId::from("lobby")).await);
}

#[tokio::test]
async fn test_independent_registries_do_not_share_rooms() {
    let hub = MemoryRendezvous::new();
    let mut one = RoomRegistry::default();
    let mut two = RoomRegistry::default();
    let a = one.join_rendezvous(&hub.endpoint(), RoomId::from("r")).await.unwrap();
    two.join_rendezvous(&hub.endpoint(), RoomId::from("r")).await.unwrap();
    wait_for_peers(&a, 1).await;

    two.leave_all().await;
    wait_for_peers(&a, 0).await;
    assert!(!a.is_closed());
}

#[tokio::test]
async fn test_registry_rekey_keeps_link_open() {
    let disco = MemoryDiscovery::new();
    let (mine, theirs) = memory_link_pair(LINK_MAX_CHUNK);
    disco.advertise(SERVICE_ID, mine);
    let (cb, eb) = FramedLinkCarrier::with_local_id(theirs, PeerId::from("them"));
    let remote = Room::spawn(RoomId::from("ble"), cb, eb, &RoomConfig::default());

    let mut registry = RoomRegistry::default();
    let lobby = registry.open_link(&disco, RoomId::from("lobby")).await.unwrap();
    let game = registry
        .rekey(&RoomId::from("lobby"), RoomId::from("g1"))
        .await
        .unwrap();
    assert_eq!(game.id(), &RoomId::from("g1"));
    assert!(registry.get(&RoomId::from("lobby")).is_none());
    assert_eq!(game.local_id(), lobby.local_id());

    let (_, mut recv) = game.make_action("chat").await.unwrap();
    let (send, _) = remote.make_action("chat").await.unwrap();
    send.send(&json!({"peerId": "them", "text": "still here"}), None).await;
    assert_eq!(next(&mut recv).await.payload["text"], "still here");
}

#[tokio::test]
async fn test_registry_rekey_unknown_room_fails() {
    let mut registry = RoomRegistry::default();
    assert!(matches!(
        registry.rekey(&RoomId::from("nope"), RoomId::from("g")).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unsupported_transports_fail_fast() {
    let hub = MemoryRendezvous::new();
    hub.set_supported(false);
    let mut registry = RoomRegistry::default();
    assert!(matches!(
        registry.join_rendezvous(&hub.endpoint(), RoomId::from("r")).await,
        Err(RoomError::Transport(TransportError::Unsupported(_)))
    ));
    assert!(matches!(
        registry
            .open_link(&MemoryDiscovery::unsupported(), RoomId::from("b"))
            .await,
        Err(RoomError::Transport(TransportError::Unsupported(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_connection_failures_exhaust_retries() {
    let hub = MemoryRendezvous::new();
    hub.fail_next_joins(10);
    let mut registry = RoomRegistry::default();
    let result = registry.join_rendezvous(&hub.endpoint(), RoomId::from("r")).await;
    assert!(matches!(
        result,
        Err(RoomError::Transport(TransportError::RetriesExhausted { attempts: 4, .. }))
    ));
}
