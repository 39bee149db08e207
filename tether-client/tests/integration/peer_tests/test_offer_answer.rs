use tether_client::engine::{EngineEvent, TrackKind};
use tether_client::peer::PeerEvent;
use tether_core::{ConnectionState, NegotiationState, SdpType, SessionDescription};

use super::{next_signal, wait_for_notice};
use crate::integration::{create_test_session, init_tracing};
use crate::utils::{EngineCall, MockEngine, STEP_TIMEOUT_MS, Signal, wait_for_session_state};

#[tokio::test]
async fn test_call_sends_offer_then_connects_on_answer() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(true).await.expect("call failed");
    assert_eq!(ts.handle.state(), NegotiationState::OfferPending);

    match next_signal(&mut ts.signal_rx, STEP_TIMEOUT_MS).await {
        Some(Signal::Description { to, desc }) => {
            assert_eq!(to.as_str(), "bob");
            assert_eq!(desc.sdp_type, SdpType::Offer);
        }
        other => panic!("expected an offer, got {:?}", other),
    }

    let conn = ts.engine.connection(0).expect("no connection created");
    assert_eq!(
        conn.calls(),
        vec![
            EngineCall::AddTrack(TrackKind::Audio),
            EngineCall::AddTrack(TrackKind::Video),
            EngineCall::CreateDataChannel("data".into()),
            EngineCall::CreateOffer,
            EngineCall::SetLocal(SdpType::Offer),
        ]
    );

    ts.handle
        .remote_description(SessionDescription::answer("remote-answer"));
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();
    assert!(conn.calls().contains(&EngineCall::SetRemote(SdpType::Answer)));

    conn.emit(EngineEvent::ConnectionState(ConnectionState::Connected))
        .await;
    wait_for_session_state(&ts.handle, NegotiationState::Connected, STEP_TIMEOUT_MS)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_audio_only_call_adds_no_video() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(false).await.expect("call failed");

    let conn = ts.engine.connection(0).unwrap();
    assert!(!conn.calls().contains(&EngineCall::AddTrack(TrackKind::Video)));
}

#[tokio::test]
async fn test_second_call_is_rejected() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(false).await.expect("call failed");
    let err = ts.handle.call(false).await.unwrap_err();

    assert!(matches!(
        err,
        tether_client::NegotiationError::InvalidState { .. }
    ));
    // A rejected call leaves the session usable.
    assert_eq!(ts.handle.state(), NegotiationState::OfferPending);
}

#[tokio::test]
async fn test_incoming_offer_is_answered() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle
        .remote_description(SessionDescription::offer("v=0\r\nm=audio 9 RTP/AVP 0\r\n"));

    match next_signal(&mut ts.signal_rx, STEP_TIMEOUT_MS).await {
        Some(Signal::Description { to, desc }) => {
            assert_eq!(to.as_str(), "bob");
            assert_eq!(desc.sdp_type, SdpType::Answer);
        }
        other => panic!("expected an answer, got {:?}", other),
    }
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    let conn = ts.engine.connection(0).unwrap();
    assert_eq!(
        conn.calls(),
        vec![
            EngineCall::AddTrack(TrackKind::Audio),
            EngineCall::SetRemote(SdpType::Offer),
            EngineCall::CreateAnswer,
            EngineCall::SetLocal(SdpType::Answer),
        ]
    );
}

#[tokio::test]
async fn test_stale_answer_is_ignored() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.remote_description(SessionDescription::answer("late"));

    let event = wait_for_notice(&mut ts.notices, 200, |e| {
        matches!(e, PeerEvent::Negotiation(_) | PeerEvent::Error(_))
    })
    .await;
    assert!(event.is_none(), "unexpected {:?}", event);
    assert_eq!(ts.handle.state(), NegotiationState::Idle);
    assert_eq!(ts.engine.created(), 0);
}

#[tokio::test]
async fn test_answer_after_connected_is_ignored() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(false).await.unwrap();
    ts.handle.remote_description(SessionDescription::answer("a1"));
    let conn = ts.engine.connection(0).unwrap();
    conn.emit(EngineEvent::ConnectionState(ConnectionState::Connected))
        .await;
    wait_for_session_state(&ts.handle, NegotiationState::Connected, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    ts.handle.remote_description(SessionDescription::answer("a2"));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let remote_sets = conn
        .calls()
        .iter()
        .filter(|c| matches!(c, EngineCall::SetRemote(_)))
        .count();
    assert_eq!(remote_sets, 1);
    assert_eq!(ts.handle.state(), NegotiationState::Connected);
}

#[tokio::test]
async fn test_offer_while_negotiating_is_replayed_once_connected() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.remote_description(SessionDescription::offer("o1"));
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();
    ts.handle.remote_description(SessionDescription::offer("o2"));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let conn = ts.engine.connection(0).unwrap();
    let answers = || {
        conn.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::CreateAnswer))
            .count()
    };
    assert_eq!(answers(), 1, "second offer must wait");

    conn.emit(EngineEvent::ConnectionState(ConnectionState::Connected))
        .await;

    assert!(crate::utils::wait_until(STEP_TIMEOUT_MS, || answers() == 2).await);
    wait_for_session_state(&ts.handle, NegotiationState::Connected, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    let mut sent = 0;
    while let Some(signal) = next_signal(&mut ts.signal_rx, 100).await {
        if matches!(signal, Signal::Description { .. }) {
            sent += 1;
        }
    }
    assert_eq!(sent, 2);
}

#[tokio::test]
async fn test_renegotiation_offer_when_connected() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(false).await.unwrap();
    ts.handle.remote_description(SessionDescription::answer("a1"));
    let conn = ts.engine.connection(0).unwrap();
    conn.emit(EngineEvent::ConnectionState(ConnectionState::Connected))
        .await;
    wait_for_session_state(&ts.handle, NegotiationState::Connected, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    ts.handle.remote_description(SessionDescription::offer("o2"));

    assert!(
        crate::utils::wait_until(STEP_TIMEOUT_MS, || conn
            .calls()
            .contains(&EngineCall::SetLocal(SdpType::Answer)))
        .await
    );
    wait_for_session_state(&ts.handle, NegotiationState::Connected, STEP_TIMEOUT_MS)
        .await
        .unwrap();
    assert_eq!(ts.engine.created(), 1);
}

#[tokio::test]
async fn test_redelivered_offer_is_answered_once() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.remote_description(SessionDescription::offer("bob-offer"));
    ts.handle.remote_description(SessionDescription::offer("bob-offer"));
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    let conn = ts.engine.connection(0).unwrap();
    conn.emit(EngineEvent::ConnectionState(ConnectionState::Connected))
        .await;
    wait_for_session_state(&ts.handle, NegotiationState::Connected, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    // Arriving again after the call is up changes nothing either.
    ts.handle.remote_description(SessionDescription::offer("bob-offer"));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(
        conn.calls(),
        vec![
            EngineCall::AddTrack(TrackKind::Audio),
            EngineCall::SetRemote(SdpType::Offer),
            EngineCall::CreateAnswer,
            EngineCall::SetLocal(SdpType::Answer),
        ]
    );
    assert_eq!(ts.handle.state(), NegotiationState::Connected);

    let mut answers = 0;
    while let Some(signal) = next_signal(&mut ts.signal_rx, 100).await {
        if matches!(signal, Signal::Description { .. }) {
            answers += 1;
        }
    }
    assert_eq!(answers, 1);
}
