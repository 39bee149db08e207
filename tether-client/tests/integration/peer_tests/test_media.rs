use std::time::Duration;
use tether_client::engine::{EngineEvent, MediaSource, RemoteTrack, TrackKind};
use tether_client::peer::PeerEvent;
use tether_core::{ChatMessage, SdpType};

use super::wait_for_notice;
use crate::integration::{create_test_session, init_tracing};
use crate::utils::{EngineCall, MockEngine, STEP_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_source_disabled_before_call_applies_to_new_tracks() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.set_source_enabled(MediaSource::Microphone, false);
    ts.handle.call(false).await.unwrap();

    let conn = ts.engine.connection(0).unwrap();
    assert_eq!(
        conn.calls(),
        vec![
            EngineCall::AddTrack(TrackKind::Audio),
            EngineCall::SetSource(MediaSource::Microphone, false),
            EngineCall::CreateDataChannel("data".into()),
            EngineCall::CreateOffer,
            EngineCall::SetLocal(SdpType::Offer),
        ]
    );
}

#[tokio::test]
async fn test_camera_toggles_during_call() {
    init_tracing();
    let ts = create_test_session("alice", "bob", MockEngine::new());
    ts.handle.call(true).await.unwrap();

    ts.handle.set_source_enabled(MediaSource::Camera, false);
    ts.handle.set_source_enabled(MediaSource::Camera, true);

    let conn = ts.engine.connection(0).unwrap();
    assert!(
        wait_until(STEP_TIMEOUT_MS, || conn
            .calls()
            .contains(&EngineCall::SetSource(MediaSource::Camera, true)))
        .await
    );
    let toggles: Vec<_> = conn
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::SetSource(..)))
        .collect();
    assert_eq!(
        toggles,
        vec![
            EngineCall::SetSource(MediaSource::Camera, false),
            EngineCall::SetSource(MediaSource::Camera, true),
        ]
    );
}

#[tokio::test]
async fn test_stats_are_reported_until_disabled() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());
    ts.handle.call(false).await.unwrap();

    let message = ChatMessage::new("ping");
    let sent_len = message.to_bytes().unwrap().len() as u64;
    ts.handle.send_message(message).await.unwrap();

    ts.handle.report_stats(Some(Duration::from_millis(20)));
    match wait_for_notice(&mut ts.notices, STEP_TIMEOUT_MS, |e| {
        matches!(e, PeerEvent::Stats(_))
    })
    .await
    {
        Some(PeerEvent::Stats(stats)) => {
            assert_eq!(stats.bytes_sent, sent_len);
            assert_eq!(stats.packets_sent, 1);
        }
        other => panic!("expected stats, got {:?}", other),
    }

    ts.handle.report_stats(None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    while ts.notices.try_recv().is_ok() {}

    let late = wait_for_notice(&mut ts.notices, 200, |e| matches!(e, PeerEvent::Stats(_))).await;
    assert!(late.is_none());
}

#[tokio::test]
async fn test_no_stats_without_connection() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());

    ts.handle.report_stats(Some(Duration::from_millis(20)));

    let stats = wait_for_notice(&mut ts.notices, 150, |e| matches!(e, PeerEvent::Stats(_))).await;
    assert!(stats.is_none());
}

#[tokio::test]
async fn test_remote_track_removal_is_reported() {
    init_tracing();
    let mut ts = create_test_session("alice", "bob", MockEngine::new());
    ts.handle.call(true).await.unwrap();

    let track = RemoteTrack {
        id: "video".into(),
        stream_id: "bob".into(),
        kind: TrackKind::Video,
    };
    let conn = ts.engine.connection(0).unwrap();
    conn.emit(EngineEvent::Track(track.clone())).await;
    conn.emit(EngineEvent::TrackRemoved(track.clone())).await;

    match wait_for_notice(&mut ts.notices, STEP_TIMEOUT_MS, |e| {
        matches!(e, PeerEvent::TrackRemoved(_))
    })
    .await
    {
        Some(PeerEvent::TrackRemoved(removed)) => assert_eq!(removed, track),
        other => panic!("expected a removed track, got {:?}", other),
    }
}
