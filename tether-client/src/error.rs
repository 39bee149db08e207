use std::time::Duration;
use tether_core::{ContactId, DecodeError, EncodeError, NegotiationState};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("connect to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    #[error("socket error: {0}")]
    Socket(String),

    #[error("{0}")]
    Encode(String),
}

impl From<EncodeError> for TransportError {
    fn from(e: EncodeError) -> Self {
        TransportError::Encode(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("peer connection is closed")]
    Closed,

    #[error("media engine error: {0}")]
    Native(String),
}

impl From<webrtc::Error> for EngineError {
    fn from(e: webrtc::Error) -> Self {
        EngineError::Native(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum NegotiationError {
    #[error("media engine failed during {step}: {source}")]
    Engine {
        step: &'static str,
        #[source]
        source: EngineError,
    },

    #[error("failed to signal {step}: {source}")]
    Signaling {
        step: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: NegotiationState,
    },

    #[error("negotiation interrupted by close")]
    Interrupted,
}

#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("no session for contact {0}")]
    NoSession(ContactId),

    #[error("no active contact")]
    NoActiveContact,

    #[error("session registry has shut down")]
    RegistryClosed,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
