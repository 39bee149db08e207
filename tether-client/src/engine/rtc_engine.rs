use crate::engine::{
    ConnectionStats, EngineEvent, MediaEngine, MediaSource, PeerConnection, RemoteTrack, TrackKind,
};
use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tether_core::{ConnectionState, IceCandidate, IceServerConfig, SessionDescription};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine as NativeMediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::stats::StatsReportType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

type DataChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

struct LocalTrack {
    source: MediaSource,
    track: Arc<TrackLocalStaticSample>,
    sender: Arc<RTCRtpSender>,
}

/// `MediaEngine` backed by webrtc-rs.
pub struct RtcEngine {
    api: API,
}

impl RtcEngine {
    pub fn new() -> Result<Self, EngineError> {
        let mut media_engine = NativeMediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

#[async_trait]
impl MediaEngine for RtcEngine {
    async fn create_peer_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerConnection>, EngineError> {
        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(self.api.new_peer_connection(rtc_config).await?);
        let data_channel: DataChannelSlot = Arc::new(Mutex::new(None));

        let state_tx = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            Box::pin(async move {
                debug!("Native peer connection state: {:?}", s);
                let Some(state) = map_state(s) else { return };
                let _ = tx.send(EngineEvent::ConnectionState(state)).await;
            })
        }));

        let ice_tx = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    candidate: init.candidate,
                };
                let _ = tx.send(EngineEvent::IceCandidate(candidate)).await;
            })
        }));

        let track_tx = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let kind = match track.kind() {
                    RTPCodecType::Audio => Some(TrackKind::Audio),
                    RTPCodecType::Video => Some(TrackKind::Video),
                    _ => None,
                };
                let remote = kind.map(|kind| RemoteTrack {
                    id: track.id(),
                    stream_id: track.stream_id(),
                    kind,
                });
                Box::pin(async move {
                    let Some(remote) = remote else { return };
                    info!("Remote {:?} track {} arrived", remote.kind, remote.id);
                    let _ = tx.send(EngineEvent::Track(remote.clone())).await;

                    // The track ends when its RTP stream does.
                    tokio::spawn(async move {
                        while track.read_rtp().await.is_ok() {}
                        info!("Remote {:?} track {} removed", remote.kind, remote.id);
                        let _ = tx.send(EngineEvent::TrackRemoved(remote)).await;
                    });
                })
            },
        ));

        let dc_tx = events.clone();
        let dc_slot = data_channel.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let slot = dc_slot.clone();
            Box::pin(async move {
                debug!("Remote opened data channel '{}'", dc.label());
                bind_data_channel(&dc, tx);
                slot.lock().await.replace(dc);
            })
        }));

        Ok(Arc::new(RtcPeerConnection {
            pc,
            events,
            data_channel,
            local_tracks: Mutex::new(Vec::new()),
        }))
    }
}

struct RtcPeerConnection {
    pc: Arc<RTCPeerConnection>,
    events: mpsc::Sender<EngineEvent>,
    data_channel: DataChannelSlot,
    local_tracks: Mutex<Vec<LocalTrack>>,
}

#[async_trait]
impl PeerConnection for RtcPeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        from_native(self.pc.create_offer(None).await?)
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        from_native(self.pc.create_answer(None).await?)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.pc.set_local_description(to_native(desc)?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.pc.set_remote_description(to_native(desc)?).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), EngineError> {
        let rollback: RTCSessionDescription =
            serde_json::from_value(serde_json::json!({ "type": "rollback", "sdp": "" }))
                .map_err(|e| EngineError::Native(e.to_string()))?;
        self.pc.set_local_description(rollback).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn remove_ice_candidates(&self, candidates: &[IceCandidate]) -> Result<(), EngineError> {
        // webrtc-rs has no candidate removal; the ICE agent prunes on its own.
        debug!("Ignoring removal of {} remote candidates", candidates.len());
        Ok(())
    }

    async fn add_track(&self, kind: TrackKind, stream_id: &str) -> Result<(), EngineError> {
        let (capability, source) = match kind {
            TrackKind::Audio => (
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                MediaSource::Microphone,
            ),
            TrackKind::Video => (
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                MediaSource::Camera,
            ),
        };

        let track = Arc::new(TrackLocalStaticSample::new(
            capability,
            source.track_id().to_owned(),
            stream_id.to_owned(),
        ));
        let sender = self
            .pc
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP has to be read for interceptors to work.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        self.local_tracks.lock().await.push(LocalTrack {
            source,
            track,
            sender,
        });
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), EngineError> {
        let dc = self.pc.create_data_channel(label, None).await?;
        bind_data_channel(&dc, self.events.clone());
        self.data_channel.lock().await.replace(dc);
        Ok(())
    }

    async fn send_data(&self, data: Bytes) -> Result<(), EngineError> {
        let Some(dc) = self.data_channel.lock().await.clone() else {
            return Err(EngineError::Native("no data channel".to_owned()));
        };
        dc.send(&data).await?;
        Ok(())
    }

    async fn set_source_enabled(&self, source: MediaSource, enabled: bool) -> Result<(), EngineError> {
        let tracks = self.local_tracks.lock().await;
        for local in tracks.iter().filter(|t| t.source == source) {
            // A sender without a track keeps its slot in the SDP but goes silent.
            let replacement = enabled.then(|| local.track.clone() as Arc<dyn TrackLocal + Send + Sync>);
            local.sender.replace_track(replacement).await?;
            info!("Track '{}' enabled: {}", local.track.id(), enabled);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<ConnectionStats, EngineError> {
        let report = self.pc.get_stats().await;
        let mut stats = ConnectionStats::default();
        for entry in report.reports.values() {
            if let StatsReportType::Transport(transport) = entry {
                stats.bytes_sent += transport.bytes_sent as u64;
                stats.bytes_received += transport.bytes_received as u64;
                stats.packets_sent += transport.packets_sent as u64;
                stats.packets_received += transport.packets_received as u64;
            }
        }
        Ok(stats)
    }

    async fn close(&self) -> Result<(), EngineError> {
        if let Some(dc) = self.data_channel.lock().await.take() {
            if let Err(e) = dc.close().await {
                warn!("Failed to close data channel: {}", e);
            }
        }
        self.local_tracks.lock().await.clear();
        self.pc.close().await?;
        Ok(())
    }
}

fn bind_data_channel(dc: &Arc<RTCDataChannel>, tx: mpsc::Sender<EngineEvent>) {
    let label = dc.label().to_owned();

    let tx_open = tx.clone();
    dc.on_open(Box::new(move || {
        let tx = tx_open.clone();
        let label = label.clone();
        Box::pin(async move {
            info!("Data channel '{}' open", label);
            let _ = tx.send(EngineEvent::DataChannelOpen(label)).await;
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(EngineEvent::DataMessage(msg.data)).await;
        })
    }));
}

fn map_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    Some(match state {
        RTCPeerConnectionState::New => ConnectionState::New,
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        _ => return None,
    })
}

fn to_native(desc: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    Ok(match desc.sdp_type {
        tether_core::SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        tether_core::SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    })
}

fn from_native(desc: RTCSessionDescription) -> Result<SessionDescription, EngineError> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(EngineError::Native(format!("unexpected description type {other}"))),
    }
}
