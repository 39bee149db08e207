use crate::engine::{ConnectionStats, RemoteTrack};
use crate::error::Error;
use async_trait::async_trait;
use tether_core::{ChatMessage, ConnectionState, Contact, NegotiationState};

/// Application-side callbacks. Called one at a time from the registry task,
/// so implementations should return quickly.
#[async_trait]
pub trait SessionObserver: Send + Sync + 'static {
    async fn on_contact_joined(&self, _contact: &Contact) {}

    async fn on_contact_left(&self, _contact: &Contact) {}

    async fn on_negotiation_state(&self, _contact: &Contact, _state: NegotiationState) {}

    async fn on_connection_state(&self, _contact: &Contact, _state: ConnectionState) {}

    async fn on_remote_track(&self, _contact: &Contact, _track: RemoteTrack) {}

    async fn on_remote_track_removed(&self, _contact: &Contact, _track: RemoteTrack) {}

    async fn on_stats(&self, _contact: &Contact, _stats: ConnectionStats) {}

    async fn on_message(&self, _contact: &Contact, _message: ChatMessage) {}

    async fn on_error(&self, _contact: Option<&Contact>, _error: &Error) {}
}
