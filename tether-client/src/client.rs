use crate::config::ClientConfig;
use crate::engine::{MediaEngine, MediaSource};
use crate::error::Result;
use crate::registry::{RegistryBridge, RegistryConfig, SessionObserver, SessionRegistryHandle};
use crate::signaling::SignalingSession;
use crate::transport::{Dialer, TransportClient, WebSocketDialer};
use std::sync::Arc;
use tether_core::{Contact, ContactId};
use tracing::{info, warn};

/// Application-facing API: one signaling connection plus the peer sessions
/// negotiated over it.
pub struct TetherClient {
    config: ClientConfig,
    signaling: SignalingSession,
    registry: SessionRegistryHandle,
}

impl TetherClient {
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: ClientConfig,
        engine: Arc<dyn MediaEngine>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self::with_dialer(config, Arc::new(WebSocketDialer), engine, observer)
    }

    pub fn with_dialer(
        config: ClientConfig,
        dialer: Arc<dyn Dialer>,
        engine: Arc<dyn MediaEngine>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let transport = TransportClient::with_dialer(config.transport.clone(), dialer);
        let signaling = SignalingSession::new(transport);
        signaling.set_user_id(config.user.id.clone());

        let registry = SessionRegistryHandle::spawn(
            RegistryConfig {
                local_id: config.user.id.clone(),
                default_ice_servers: config.ice_servers.clone(),
                auto_call_video: config.auto_call_video,
            },
            engine,
            Arc::new(signaling.clone()),
            observer,
        );
        signaling.start(Arc::new(RegistryBridge::new(registry.clone())));

        Self {
            config,
            signaling,
            registry,
        }
    }

    pub fn local_contact(&self) -> &Contact {
        &self.config.user
    }

    pub fn signaling(&self) -> &SignalingSession {
        &self.signaling
    }

    pub fn registry(&self) -> &SessionRegistryHandle {
        &self.registry
    }

    pub async fn connect(&self) -> Result<()> {
        Ok(self.signaling.connect().await?)
    }

    pub async fn join_room(&self, room: &str) -> Result<()> {
        self.signaling.connect().await?;
        Ok(self.signaling.join_room(&self.config.user, room).await?)
    }

    pub async fn call(&self, contact: &Contact, with_video: bool) -> Result<()> {
        self.signaling.set_remote_peer_id(Some(contact.id.clone()));
        self.registry.call(contact.clone(), with_video).await
    }

    /// Sends a chat message to `contact`, or to the contact of the most
    /// recent call.
    pub async fn send_message(&self, text: &str, contact: Option<&ContactId>) -> Result<()> {
        self.registry
            .send_message(text, contact.cloned())
            .await
    }

    /// Ends the active call and tells the contact, who closes their side.
    /// Other sessions and the room membership stay.
    pub async fn hangup(&self) -> Result<()> {
        self.registry.hangup(None).await?;
        self.signaling.set_remote_peer_id(None);
        Ok(())
    }

    pub async fn set_microphone_active(&self, active: bool) -> Result<()> {
        self.set_source_active(MediaSource::Microphone, active).await
    }

    pub async fn set_camera_active(&self, active: bool) -> Result<()> {
        self.set_source_active(MediaSource::Camera, active).await
    }

    pub async fn set_desktop_active(&self, active: bool) -> Result<()> {
        self.set_source_active(MediaSource::Desktop, active).await
    }

    async fn set_source_active(&self, source: MediaSource, active: bool) -> Result<()> {
        Ok(self
            .registry
            .set_source_enabled(source, active, None)
            .await?)
    }

    /// Turns periodic stats reports for the active call on or off.
    pub async fn enable_stats(&self, enable: bool) -> Result<()> {
        let period = enable.then_some(self.config.stats_period);
        Ok(self.registry.report_stats(period, None).await?)
    }

    /// Closes every session, leaves the room and drops the signaling
    /// connection.
    pub async fn logout(&self) -> Result<()> {
        self.registry.close_all().await?;

        if let Err(e) = self.signaling.leave_room().await {
            warn!("Failed to send leave: {}", e);
        }
        self.signaling.disconnect().await;
        info!("Logged out {}", self.config.user);
        Ok(())
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.registry.contacts().await?)
    }
}

impl Drop for TetherClient {
    fn drop(&mut self) {
        self.signaling.stop();
    }
}
