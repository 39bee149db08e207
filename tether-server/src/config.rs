use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use tether_core::IceServerConfig;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Handed to every client in `room-joined`.
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            ice_servers: vec![IceServerConfig::default()],
        }
    }
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }
}
