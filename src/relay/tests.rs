use super::group::{BroadcastGroup, GLOBAL_GROUP};
use super::Relay;
use crate::connection::{Connection, ConnectionId};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

fn join(relay: &mut Relay) -> (ConnectionId, UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn = Connection::new(tx);
    let id = conn.id.clone();
    relay.connect(conn);
    (id, rx)
}

#[test]
fn test_group_new() {
    let group = BroadcastGroup::new(GLOBAL_GROUP);
    assert_eq!(group.name, "chat_global");
    assert!(group.is_empty());
}

#[test]
fn test_group_join_and_leave() {
    let mut group = BroadcastGroup::new(GLOBAL_GROUP);
    group.join("a".to_string());
    group.join("a".to_string());
    assert_eq!(group.len(), 1);
    assert!(group.leave(&"a".to_string()));
    assert!(!group.leave(&"a".to_string()));
}

#[test]
fn test_group_recipients_exclude_sender() {
    let mut group = BroadcastGroup::new(GLOBAL_GROUP);
    group.join("a".to_string());
    group.join("b".to_string());
    group.join("c".to_string());
    let sender = "a".to_string();
    let mut recipients: Vec<_> = group.recipients(&sender).cloned().collect();
    recipients.sort();
    assert_eq!(recipients, vec!["b".to_string(), "c".to_string()]);
}

#[test]
fn test_relay_new() {
    let relay = Relay::default();
    assert!(relay.connections.is_empty());
    assert_eq!(relay.member_count(), 0);
    assert_eq!(relay.group_name(), GLOBAL_GROUP);
}

#[test]
fn test_connect_joins_group() {
    let mut relay = Relay::new();
    let (id, _rx) = join(&mut relay);
    assert!(relay.connections.contains_key(&id));
    assert!(relay.is_member(&id));
    assert_eq!(relay.member_count(), 1);
}

#[test]
fn test_relay_reaches_everyone_but_sender() {
    let mut relay = Relay::new();
    let (a, mut rx_a) = join(&mut relay);
    let (_b, mut rx_b) = join(&mut relay);
    let (_c, mut rx_c) = join(&mut relay);

    let delivered = relay.relay(&a, WsMessage::text("hello"));
    assert_eq!(delivered, 2);

    assert_eq!(rx_b.try_recv().unwrap(), WsMessage::text("hello"));
    assert_eq!(rx_c.try_recv().unwrap(), WsMessage::text("hello"));
    assert!(rx_a.try_recv().is_err());
}

#[test]
fn test_relay_passes_binary_unmodified() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let (_b, mut rx_b) = join(&mut relay);

    let payload = vec![0u8, 159, 146, 150, 255];
    relay.relay(&a, WsMessage::binary(payload.clone()));

    match rx_b.try_recv().unwrap() {
        WsMessage::Binary(data) => assert_eq!(data.as_ref(), payload.as_slice()),
        other => panic!("Expected a binary message, got {other:?}"),
    }
}

#[test]
fn test_relay_ignores_control_frames() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let (_b, mut rx_b) = join(&mut relay);

    assert_eq!(relay.relay(&a, WsMessage::Ping(vec![1, 2].into())), 0);
    assert_eq!(relay.relay(&a, WsMessage::Close(None)), 0);
    assert!(rx_b.try_recv().is_err());
}

#[test]
fn test_relay_preserves_sender_order() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let (_b, mut rx_b) = join(&mut relay);

    for i in 0..50 {
        relay.relay(&a, WsMessage::text(format!("m{i}")));
    }
    for i in 0..50 {
        assert_eq!(rx_b.try_recv().unwrap(), WsMessage::text(format!("m{i}")));
    }
}

#[test]
fn test_relay_with_no_other_members() {
    let mut relay = Relay::new();
    let (a, mut rx_a) = join(&mut relay);
    assert_eq!(relay.relay(&a, WsMessage::text("x")), 0);
    assert!(rx_a.try_recv().is_err());
}

#[test]
fn test_failed_delivery_does_not_block_others() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let (_b, rx_b) = join(&mut relay);
    let (_c, mut rx_c) = join(&mut relay);

    // b's send loop is gone but b has not been cleaned up yet
    drop(rx_b);

    let delivered = relay.relay(&a, WsMessage::text("hello"));
    assert_eq!(delivered, 1);
    assert_eq!(rx_c.try_recv().unwrap(), WsMessage::text("hello"));
}

#[test]
fn test_disconnect_removes_member() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let (b, mut rx_b) = join(&mut relay);

    assert!(relay.disconnect(&b, None));
    assert!(!relay.is_member(&b));
    assert!(!relay.connections.contains_key(&b));

    assert_eq!(relay.relay(&a, WsMessage::text("ping")), 0);
    // b's queue was dropped with its connection: nothing pending, channel closed
    assert!(matches!(
        rx_b.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_departed_client_cannot_relay() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let (_b, mut rx_b) = join(&mut relay);

    relay.disconnect(&a, None);

    assert_eq!(relay.relay(&a, WsMessage::text("late")), 0);
    assert!(rx_b.try_recv().is_err());
}

#[test]
fn test_disconnect_twice_is_harmless() {
    let mut relay = Relay::new();
    let (a, _rx_a) = join(&mut relay);
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "bye".into(),
    };

    assert!(relay.disconnect(&a, Some(&frame)));
    assert!(!relay.disconnect(&a, None));
    assert_eq!(relay.member_count(), 0);
}

#[test]
fn test_membership_matches_open_connections() {
    let mut relay = Relay::new();
    let mut ids = Vec::new();
    let mut receivers = Vec::new();
    for _ in 0..5 {
        let (id, rx) = join(&mut relay);
        ids.push(id);
        receivers.push(rx);
    }
    relay.disconnect(&ids[1], None);
    relay.disconnect(&ids[3], None);

    assert_eq!(relay.member_count(), relay.connections.len());
    for id in &relay.group.members {
        assert!(relay.connections.contains_key(id));
    }
}

#[test]
fn test_close_all_sends_close_frame() {
    let mut relay = Relay::new();
    let (_a, mut rx_a) = join(&mut relay);
    let (_b, mut rx_b) = join(&mut relay);

    assert_eq!(relay.close_all(), 2);
    assert_eq!(relay.member_count(), 0);
    assert!(relay.connections.is_empty());

    for rx in [&mut rx_a, &mut rx_b] {
        match rx.try_recv().unwrap() {
            WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Away),
            other => panic!("Expected a close frame, got {other:?}"),
        }
    }
}
