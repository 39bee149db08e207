use bytes::Bytes;
use tether_core::{ConnectionState, IceCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A local capture source whose outgoing track can be paused mid-call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSource {
    Microphone,
    Camera,
    Desktop,
}

impl MediaSource {
    /// Id of the local track fed by this source.
    pub fn track_id(self) -> &'static str {
        match self {
            MediaSource::Microphone => "audio",
            MediaSource::Camera => "video",
            MediaSource::Desktop => "desktop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// Transport counters of one peer connection at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Callbacks from a native peer connection, delivered in order on the
/// channel handed to `MediaEngine::create_peer_connection`.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    IceCandidate(IceCandidate),
    IceCandidatesRemoved(Vec<IceCandidate>),
    ConnectionState(ConnectionState),
    Track(RemoteTrack),
    TrackRemoved(RemoteTrack),
    DataChannelOpen(String),
    DataMessage(Bytes),
}
