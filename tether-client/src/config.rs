use crate::transport::TransportConfig;
use serde::Deserialize;
use std::time::Duration;
use tether_core::{Contact, ContactId, IceServerConfig};

pub const DEFAULT_STATS_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    /// Who we are in the room.
    pub user: Contact,
    /// Used until the server hands out room-specific servers.
    pub ice_servers: Vec<IceServerConfig>,
    pub auto_call_video: bool,
    /// How often stats are reported once enabled.
    pub stats_period: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, user: Contact) -> Self {
        Self {
            transport: TransportConfig::new(url),
            user,
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let id = ContactId::generate();
        Self {
            transport: TransportConfig::default(),
            user: Contact::unnamed(id),
            ice_servers: vec![IceServerConfig::default()],
            auto_call_video: false,
            stats_period: DEFAULT_STATS_PERIOD,
        }
    }
}
