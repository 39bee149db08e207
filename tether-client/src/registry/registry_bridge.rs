use crate::error::TransportError;
use crate::registry::{RegistryCommand, SessionRegistryHandle};
use crate::signaling::SignalingHandler;
use async_trait::async_trait;
use tether_core::{Contact, ContactId, IceCandidate, RoomJoinedPayload, SessionDescription};
use tracing::{info, warn};

/// Feeds inbound signaling into the registry.
pub struct RegistryBridge {
    registry: SessionRegistryHandle,
}

impl RegistryBridge {
    pub fn new(registry: SessionRegistryHandle) -> Self {
        Self { registry }
    }

    fn forward(&self, cmd: RegistryCommand) {
        if let Err(e) = self.registry.send(cmd) {
            warn!("Dropping signaling event: {}", e);
        }
    }
}

#[async_trait]
impl SignalingHandler for RegistryBridge {
    async fn on_offer(&self, from: ContactId, offer: SessionDescription) {
        self.forward(RegistryCommand::RemoteDescription { from, desc: offer });
    }

    async fn on_answer(&self, from: ContactId, answer: SessionDescription) {
        self.forward(RegistryCommand::RemoteDescription { from, desc: answer });
    }

    async fn on_candidate(&self, from: ContactId, candidate: IceCandidate) {
        self.forward(RegistryCommand::RemoteCandidate { from, candidate });
    }

    async fn on_candidates_removed(&self, from: ContactId, candidates: Vec<IceCandidate>) {
        self.forward(RegistryCommand::RemoteCandidatesRemoved { from, candidates });
    }

    async fn on_join(&self, contact: Contact, _room: String) {
        self.forward(RegistryCommand::ContactJoined(contact));
    }

    async fn on_leave(&self, from: ContactId) {
        self.forward(RegistryCommand::ContactLeft(from));
    }

    async fn on_hangup(&self, from: ContactId) {
        self.forward(RegistryCommand::RemoteHangup(from));
    }

    async fn on_room_joined(&self, joined: RoomJoinedPayload) {
        self.forward(RegistryCommand::RoomJoined(joined));
    }

    async fn on_closed(&self) {
        info!("Signaling closed; existing peer sessions stay up");
    }

    async fn on_error(&self, error: TransportError) {
        self.forward(RegistryCommand::SignalingError(error));
    }
}
