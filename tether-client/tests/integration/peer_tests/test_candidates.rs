use tether_client::engine::EngineEvent;
use tether_core::{IceCandidate, NegotiationState, SdpType, SessionDescription};

use super::next_signal;
use crate::integration::{create_test_session, init_tracing};
use crate::utils::{
    EngineCall, MockEngine, STEP_TIMEOUT_MS, Signal, wait_for_session_state, wait_until,
};

fn candidate(n: u32) -> IceCandidate {
    IceCandidate::new("0", 0, format!("candidate:{n} 1 udp 1 10.0.0.{n} 9 typ host"))
}

#[tokio::test]
async fn test_early_candidates_are_applied_in_order_after_offer() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.remote_candidate(candidate(1));
    ts.handle.remote_candidate(candidate(2));
    ts.handle
        .remote_description(SessionDescription::offer("bob-offer"));
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();
    ts.handle.remote_candidate(candidate(3));

    let conn = ts.engine.connection(0).unwrap();
    assert!(
        wait_until(STEP_TIMEOUT_MS, || conn
            .calls()
            .contains(&EngineCall::AddCandidate(candidate(3).candidate)))
        .await
    );

    let calls: Vec<_> = conn
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                EngineCall::SetRemote(_) | EngineCall::AddCandidate(_) | EngineCall::CreateAnswer
            )
        })
        .collect();
    assert_eq!(
        calls,
        vec![
            EngineCall::SetRemote(SdpType::Offer),
            EngineCall::AddCandidate(candidate(1).candidate),
            EngineCall::AddCandidate(candidate(2).candidate),
            EngineCall::CreateAnswer,
            EngineCall::AddCandidate(candidate(3).candidate),
        ]
    );
}

#[tokio::test]
async fn test_candidates_wait_for_answer_on_caller_side() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(false).await.unwrap();
    ts.handle.remote_candidate(candidate(1));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let conn = ts.engine.connection(0).unwrap();
    assert!(
        !conn
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::AddCandidate(_))),
        "candidate applied before remote description"
    );

    ts.handle.remote_description(SessionDescription::answer("a"));
    assert!(
        wait_until(STEP_TIMEOUT_MS, || conn
            .calls()
            .contains(&EngineCall::AddCandidate(candidate(1).candidate)))
        .await
    );
}

#[tokio::test]
async fn test_removed_candidate_is_dropped_from_queue() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.remote_candidate(candidate(1));
    ts.handle.remote_candidate(candidate(2));
    ts.handle.remote_candidates_removed(vec![candidate(1)]);
    ts.handle.remote_description(SessionDescription::offer("o"));
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();

    let conn = ts.engine.connection(0).unwrap();
    let added: Vec<_> = conn
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::AddCandidate(_)))
        .collect();
    assert_eq!(added, vec![EngineCall::AddCandidate(candidate(2).candidate)]);
}

#[tokio::test]
async fn test_removal_after_remote_description_reaches_engine() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.remote_description(SessionDescription::offer("o"));
    wait_for_session_state(&ts.handle, NegotiationState::Negotiating, STEP_TIMEOUT_MS)
        .await
        .unwrap();
    ts.handle.remote_candidates_removed(vec![candidate(4)]);

    let conn = ts.engine.connection(0).unwrap();
    assert!(
        wait_until(STEP_TIMEOUT_MS, || conn
            .calls()
            .contains(&EngineCall::RemoveCandidates(vec![candidate(4).candidate])))
        .await
    );
}

#[tokio::test]
async fn test_local_candidates_are_signaled() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.call(false).await.unwrap();
    let _offer = next_signal(&mut ts.signal_rx, STEP_TIMEOUT_MS).await;

    let conn = ts.engine.connection(0).unwrap();
    conn.emit(EngineEvent::IceCandidate(candidate(7))).await;
    conn.emit(EngineEvent::IceCandidatesRemoved(vec![candidate(7)]))
        .await;

    assert_eq!(
        next_signal(&mut ts.signal_rx, STEP_TIMEOUT_MS).await,
        Some(Signal::Ice {
            to: "bob".into(),
            candidate: candidate(7)
        })
    );
    assert_eq!(
        next_signal(&mut ts.signal_rx, STEP_TIMEOUT_MS).await,
        Some(Signal::CandidatesRemoved {
            to: "bob".into(),
            candidates: vec![candidate(7)]
        })
    );
}
