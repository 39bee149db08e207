mod client;
mod config;
pub mod engine;
pub mod error;
pub mod peer;
pub mod registry;
pub mod signaling;
pub mod transport;

pub use client::TetherClient;
pub use config::ClientConfig;
pub use engine::{
    ConnectionStats, EngineEvent, MediaEngine, MediaSource, PeerConnection, RemoteTrack, RtcEngine,
    TrackKind,
};
pub use error::{EngineError, Error, LookupError, NegotiationError, Result, TransportError};
pub use peer::{PeerSession, PeerSessionHandle};
pub use registry::{SessionObserver, SessionRegistry, SessionRegistryHandle};
pub use signaling::{SignalingHandler, SignalingOutput, SignalingSession};
pub use transport::{TransportClient, TransportConfig, TransportEvent};
