use crate::error::TransportError;
use async_trait::async_trait;
use tether_core::{Contact, ContactId, IceCandidate, RoomJoinedPayload, SessionDescription};

/// Typed callbacks for inbound signaling. All of them run on one dispatch
/// loop, one frame at a time.
#[async_trait]
pub trait SignalingHandler: Send + Sync + 'static {
    async fn on_offer(&self, _from: ContactId, _offer: SessionDescription) {}

    async fn on_answer(&self, _from: ContactId, _answer: SessionDescription) {}

    async fn on_candidate(&self, _from: ContactId, _candidate: IceCandidate) {}

    async fn on_candidates_removed(&self, _from: ContactId, _candidates: Vec<IceCandidate>) {}

    async fn on_join(&self, _contact: Contact, _room: String) {}

    async fn on_leave(&self, _from: ContactId) {}

    async fn on_hangup(&self, _from: ContactId) {}

    async fn on_room_joined(&self, _joined: RoomJoinedPayload) {}

    async fn on_closed(&self) {}

    async fn on_error(&self, _error: TransportError) {}
}
