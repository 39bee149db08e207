use crate::error::TransportError;
use async_trait::async_trait;
use tether_core::{ContactId, IceCandidate, SessionDescription};

/// Outbound half of signaling as seen by a peer session: everything a
/// negotiation needs to tell the remote side.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_description(
        &self,
        to: &ContactId,
        desc: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn send_ice(&self, to: &ContactId, candidate: IceCandidate) -> Result<(), TransportError>;

    async fn send_candidates_removed(
        &self,
        to: &ContactId,
        candidates: Vec<IceCandidate>,
    ) -> Result<(), TransportError>;

    /// Tells `to` that we closed our session with them.
    async fn send_hangup(&self, to: &ContactId) -> Result<(), TransportError>;
}
