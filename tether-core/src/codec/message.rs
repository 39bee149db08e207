use crate::codec::MessageType;
use crate::model::{Contact, ContactId, IceCandidate, Room, SdpType, SessionDescription};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: ContactId,
    #[serde(default)]
    pub name: String,
}

impl From<&Contact> for UserInfo {
    fn from(contact: &Contact) -> Self {
        Self {
            user_id: contact.id.clone(),
            name: contact.display_name.clone(),
        }
    }
}

impl From<UserInfo> for Contact {
    fn from(info: UserInfo) -> Self {
        Contact::new(info.user_id, info.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub room: String,
    pub user_info: UserInfo,
}

/// Server reply to a join: the room parameters, whether the joiner should
/// start calls, and who was already there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomJoinedPayload {
    pub room: Room,
    pub initiator: bool,
    #[serde(default)]
    pub peers: Vec<Contact>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Join(JoinPayload),
    Leave,
    /// Ends the call with the addressee without leaving the room.
    Hangup,
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate(IceCandidate),
    IceCandidatesRemoved(Vec<IceCandidate>),
    Heartbeat,
    HeartbeatAck,
    RoomJoined(RoomJoinedPayload),
    /// Any `type` this codec does not know. Kept so callers can log it.
    Unknown(String),
}

impl MessageBody {
    pub fn kind(&self) -> Option<MessageType> {
        Some(match self {
            MessageBody::Join(_) => MessageType::Join,
            MessageBody::Leave => MessageType::Leave,
            MessageBody::Hangup => MessageType::Hangup,
            MessageBody::Offer { .. } => MessageType::Offer,
            MessageBody::Answer { .. } => MessageType::Answer,
            MessageBody::IceCandidate(_) => MessageType::IceCandidate,
            MessageBody::IceCandidatesRemoved(_) => MessageType::IceCandidatesRemoved,
            MessageBody::Heartbeat => MessageType::Heartbeat,
            MessageBody::HeartbeatAck => MessageType::HeartbeatAck,
            MessageBody::RoomJoined(_) => MessageType::RoomJoined,
            MessageBody::Unknown(_) => return None,
        })
    }

    pub fn type_name(&self) -> &str {
        match self {
            MessageBody::Unknown(kind) => kind,
            other => other.kind().map(MessageType::as_str).unwrap_or_default(),
        }
    }
}

impl From<SessionDescription> for MessageBody {
    fn from(desc: SessionDescription) -> Self {
        match desc.sdp_type {
            SdpType::Offer => MessageBody::Offer { sdp: desc.sdp },
            SdpType::Answer => MessageBody::Answer { sdp: desc.sdp },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingMessage {
    pub from: ContactId,
    pub to: Option<ContactId>,
    pub body: MessageBody,
}

impl SignalingMessage {
    pub fn new(from: impl Into<ContactId>, body: MessageBody) -> Self {
        Self {
            from: from.into(),
            to: None,
            body,
        }
    }

    pub fn to(mut self, to: impl Into<ContactId>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn heartbeat(from: impl Into<ContactId>) -> Self {
        Self::new(from, MessageBody::Heartbeat)
    }
}
