use crate::engine::{ConnectionStats, MediaSource, RemoteTrack};
use crate::error::{Error, NegotiationError};
use tether_core::{
    ChatMessage, ConnectionState, Contact, IceCandidate, NegotiationState, SessionDescription,
};
use std::time::Duration;
use tokio::sync::oneshot;

/// Work queued for a single peer session, processed strictly in order.
#[derive(Debug)]
pub enum PeerCommand {
    /// Local call: create and send an offer.
    Call {
        with_video: bool,
        reply: oneshot::Sender<Result<(), NegotiationError>>,
    },

    /// Offer or answer from the remote side.
    RemoteDescription(SessionDescription),

    RemoteCandidate(IceCandidate),

    RemoteCandidatesRemoved(Vec<IceCandidate>),

    SendMessage {
        message: ChatMessage,
        reply: oneshot::Sender<Result<(), Error>>,
    },

    /// Pauses or resumes a local source. Remembered for tracks added later.
    SetSourceEnabled {
        source: MediaSource,
        enabled: bool,
    },

    /// Starts periodic `PeerEvent::Stats` reports, or stops them on `None`.
    ReportStats(Option<Duration>),
}

#[derive(Debug, Clone)]
pub enum PeerEvent {
    Negotiation(NegotiationState),
    Connection(ConnectionState),
    Track(RemoteTrack),
    TrackRemoved(RemoteTrack),
    Stats(ConnectionStats),
    Message(ChatMessage),
    Error(NegotiationError),
}

/// A `PeerEvent` tagged with the session that produced it.
#[derive(Debug, Clone)]
pub struct PeerNotice {
    pub contact: Contact,
    pub session_id: u64,
    pub event: PeerEvent,
}
