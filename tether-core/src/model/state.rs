use serde::{Deserialize, Serialize};

/// Connection state as reported by the media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

/// Where a peer session is in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationState {
    Idle,
    OfferPending,
    AnswerPending,
    Negotiating,
    Connected,
    Closed,
    Failed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }

    pub fn is_live(self) -> bool {
        !matches!(self, NegotiationState::Closed | NegotiationState::Failed)
    }
}
