use crate::engine::MediaSource;
use crate::error::{Error, LookupError, NegotiationError, TransportError};
use crate::peer::PeerSessionHandle;
use tether_core::{Contact, ContactId, IceCandidate, RoomJoinedPayload, SessionDescription};
use std::time::Duration;
use tokio::sync::oneshot;

/// Requests handled by the registry actor, from signaling and from the
/// application.
#[derive(Debug)]
pub enum RegistryCommand {
    RoomJoined(RoomJoinedPayload),

    ContactJoined(Contact),

    ContactLeft(ContactId),

    RemoteDescription {
        from: ContactId,
        desc: SessionDescription,
    },

    RemoteCandidate {
        from: ContactId,
        candidate: IceCandidate,
    },

    RemoteCandidatesRemoved {
        from: ContactId,
        candidates: Vec<IceCandidate>,
    },

    /// The contact ended the call with us but is still in the room.
    RemoteHangup(ContactId),

    SignalingError(TransportError),

    Call {
        contact: Contact,
        with_video: bool,
        reply: oneshot::Sender<Result<(), NegotiationError>>,
    },

    SendMessage {
        text: String,
        contact: Option<ContactId>,
        reply: oneshot::Sender<Result<(), Error>>,
    },

    /// Closes the session with `contact`, or with the active contact.
    Hangup {
        contact: Option<ContactId>,
        reply: oneshot::Sender<Result<(), LookupError>>,
    },

    SetSourceEnabled {
        source: MediaSource,
        enabled: bool,
        contact: Option<ContactId>,
        reply: oneshot::Sender<Result<(), LookupError>>,
    },

    ReportStats {
        period: Option<Duration>,
        contact: Option<ContactId>,
        reply: oneshot::Sender<Result<(), LookupError>>,
    },

    GetOrCreate {
        contact: Contact,
        reply: oneshot::Sender<PeerSessionHandle>,
    },

    Remove {
        contact: ContactId,
        reply: oneshot::Sender<bool>,
    },

    CloseAll {
        reply: oneshot::Sender<()>,
    },

    Contacts {
        reply: oneshot::Sender<Vec<Contact>>,
    },
}
