use std::sync::Arc;
use tether_client::{SignalingSession, TransportClient, TransportConfig};
use tether_core::{
    Contact, IceCandidate, JoinPayload, MessageBody, Room, RoomJoinedPayload, SignalingMessage,
    UserInfo,
};
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{Handled, MemoryDialer, RecordingHandler, ServerEnd, next_handled};

struct Harness {
    session: SignalingSession,
    server: ServerEnd,
    handled: mpsc::UnboundedReceiver<Handled>,
}

async fn started_session(user: &str) -> Harness {
    let (dialer, mut ends) = MemoryDialer::new();
    let transport =
        TransportClient::with_dialer(TransportConfig::new("mem://signaling"), Arc::new(dialer));
    let session = SignalingSession::new(transport);
    session.set_user_id(user.into());

    let (handler, handled) = RecordingHandler::new();
    session.start(Arc::new(handler));
    session.connect().await.expect("connect failed");
    let server = ends.recv().await.expect("no connection dialed");

    Harness {
        session,
        server,
        handled,
    }
}

#[tokio::test]
async fn test_undecodable_frame_does_not_stop_dispatch() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server.push("{not json");
    h.server.push(r#"{"from":"bob","data":{}}"#);
    h.server.push(r#"{"type":"answer","from":"bob","data":{"nope":1}}"#);
    h.server
        .push(r#"{"type":"answer","from":"bob","to":"alice","data":{"sdp":"v=0"}}"#);

    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::Answer(from, desc)) => {
            assert_eq!(from.as_str(), "bob");
            assert_eq!(desc.sdp, "v=0");
        }
        other => panic!("expected the answer, got {:?}", other),
    }
    assert!(next_handled(&mut h.handled, 100).await.is_none());
}

#[tokio::test]
async fn test_own_and_foreign_messages_are_ignored() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server.push_message(
        &SignalingMessage::new("alice", MessageBody::Offer { sdp: "echo".into() }),
    );
    h.server.push_message(
        &SignalingMessage::new("bob", MessageBody::Offer { sdp: "for-carol".into() }).to("carol"),
    );
    h.server.push_message(
        &SignalingMessage::new("bob", MessageBody::Offer { sdp: "mine".into() }).to("alice"),
    );

    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::Offer(from, desc)) => {
            assert_eq!(from.as_str(), "bob");
            assert_eq!(desc.sdp, "mine");
        }
        other => panic!("expected bob's offer, got {:?}", other),
    }
    assert!(next_handled(&mut h.handled, 100).await.is_none());
}

#[tokio::test]
async fn test_offer_remembers_remote_peer() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server
        .push_message(&SignalingMessage::new("bob", MessageBody::Offer { sdp: "o".into() }));
    assert!(matches!(
        next_handled(&mut h.handled, 1000).await,
        Some(Handled::Offer(..))
    ));

    assert_eq!(
        h.session.identity().remote_peer_id.map(|id| id.0),
        Some("bob".to_owned())
    );
}

#[tokio::test]
async fn test_unknown_and_heartbeat_frames_reach_no_handler() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server.push(r#"{"type":"presence","from":"bob"}"#);
    h.server.push_message(&SignalingMessage::new("", MessageBody::HeartbeatAck));
    h.server.push_message(&SignalingMessage::new(
        "bob",
        MessageBody::IceCandidate(IceCandidate::new("0", 0, "candidate:1")),
    ));

    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::Candidate(from, candidate)) => {
            assert_eq!(from.as_str(), "bob");
            assert_eq!(candidate.candidate, "candidate:1");
        }
        other => panic!("expected the candidate, got {:?}", other),
    }
}

#[tokio::test]
async fn test_room_events_are_routed() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server.push_message(&SignalingMessage::new(
        "",
        MessageBody::RoomJoined(RoomJoinedPayload {
            room: Room::new("lobby"),
            initiator: true,
            peers: vec![Contact::new("bob", "Bob")],
        }),
    ));
    h.server.push_message(&SignalingMessage::new(
        "carol",
        MessageBody::Join(JoinPayload {
            room: "lobby".into(),
            user_info: UserInfo {
                user_id: "carol".into(),
                name: "Carol".into(),
            },
        }),
    ));
    h.server
        .push_message(&SignalingMessage::new("bob", MessageBody::Leave));

    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::RoomJoined(joined)) => {
            assert!(joined.initiator);
            assert_eq!(joined.room.id, "lobby");
            assert_eq!(joined.peers.len(), 1);
        }
        other => panic!("expected room-joined, got {:?}", other),
    }
    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::Join(contact, room)) => {
            assert_eq!(contact.id.as_str(), "carol");
            assert_eq!(contact.display_name, "Carol");
            assert_eq!(room, "lobby");
        }
        other => panic!("expected join, got {:?}", other),
    }
    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::Leave(from)) => assert_eq!(from.as_str(), "bob"),
        other => panic!("expected leave, got {:?}", other),
    }
}

#[tokio::test]
async fn test_socket_close_reaches_handler() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server.hang_up();

    assert!(matches!(
        next_handled(&mut h.handled, 1000).await,
        Some(Handled::Closed)
    ));
}

#[tokio::test]
async fn test_stop_detaches_handler() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.session.stop();
    h.server
        .push_message(&SignalingMessage::new("bob", MessageBody::Leave));

    assert!(next_handled(&mut h.handled, 200).await.is_none());
}

#[tokio::test]
async fn test_hangup_is_routed_apart_from_leave() {
    init_tracing();
    let mut h = started_session("alice").await;

    h.server
        .push_message(&SignalingMessage::new("carol", MessageBody::Hangup).to("bob"));
    h.server
        .push_message(&SignalingMessage::new("bob", MessageBody::Hangup).to("alice"));

    match next_handled(&mut h.handled, 1000).await {
        Some(Handled::Hangup(from)) => assert_eq!(from.as_str(), "bob"),
        other => panic!("expected hangup, got {:?}", other),
    }
    assert!(next_handled(&mut h.handled, 100).await.is_none());
}
