use crate::engine::{ConnectionStats, EngineEvent, MediaSource, TrackKind};
use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tether_core::{IceCandidate, IceServerConfig, SessionDescription};
use tokio::sync::mpsc;

/// One native peer connection. Every operation may suspend; none of them
/// are called concurrently for the same connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    /// Drops a local offer that has not been answered yet.
    async fn rollback(&self) -> Result<(), EngineError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    async fn remove_ice_candidates(&self, candidates: &[IceCandidate]) -> Result<(), EngineError>;

    async fn add_track(&self, kind: TrackKind, stream_id: &str) -> Result<(), EngineError>;

    async fn create_data_channel(&self, label: &str) -> Result<(), EngineError>;

    async fn send_data(&self, data: Bytes) -> Result<(), EngineError>;

    /// Pauses or resumes the local track fed by `source`. A source with no
    /// track on this connection is left alone.
    async fn set_source_enabled(&self, source: MediaSource, enabled: bool) -> Result<(), EngineError>;

    async fn stats(&self) -> Result<ConnectionStats, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    async fn create_peer_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerConnection>, EngineError>;
}
