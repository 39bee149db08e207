use crate::codec::{
    DecodeError, EncodeError, JoinPayload, MessageBody, MessageType, RoomJoinedPayload,
    SignalingMessage,
};
use crate::model::{ContactId, IceCandidate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// `{"type", "from", "to"?, "data"?}` as it travels over the socket.
#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "ContactId::is_empty")]
    from: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<ContactId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

#[derive(Serialize, Deserialize)]
struct SdpData {
    sdp: String,
}

#[derive(Serialize, Deserialize)]
struct CandidatesData {
    candidates: Vec<IceCandidate>,
}

pub fn encode(msg: &SignalingMessage) -> Result<String, EncodeError> {
    let data = match &msg.body {
        MessageBody::Join(payload) => serde_json::to_value(payload)?,
        MessageBody::Offer { sdp } | MessageBody::Answer { sdp } => {
            serde_json::to_value(SdpData { sdp: sdp.clone() })?
        }
        MessageBody::IceCandidate(candidate) => serde_json::to_value(candidate)?,
        MessageBody::IceCandidatesRemoved(candidates) => serde_json::to_value(CandidatesData {
            candidates: candidates.clone(),
        })?,
        MessageBody::RoomJoined(payload) => serde_json::to_value(payload)?,
        MessageBody::Leave
        | MessageBody::Hangup
        | MessageBody::Heartbeat
        | MessageBody::HeartbeatAck
        | MessageBody::Unknown(_) => Value::Null,
    };

    let frame = WireFrame {
        kind: Some(msg.body.type_name().to_owned()),
        from: msg.from.clone(),
        to: msg.to.clone(),
        data,
    };

    Ok(serde_json::to_string(&frame)?)
}

/// Decodes one text frame. A frame with an unrecognised `type` decodes to
/// [`MessageBody::Unknown`] instead of failing.
pub fn decode(text: &str) -> Result<SignalingMessage, DecodeError> {
    let frame: WireFrame = serde_json::from_str(text)?;
    let kind = frame.kind.ok_or(DecodeError::MissingType)?;

    let body = match MessageType::from_str(&kind) {
        Ok(known) => decode_body(known, frame.data)?,
        Err(()) => MessageBody::Unknown(kind),
    };

    Ok(SignalingMessage {
        from: frame.from,
        to: frame.to,
        body,
    })
}

fn decode_body(kind: MessageType, data: Value) -> Result<MessageBody, DecodeError> {
    Ok(match kind {
        MessageType::Join => MessageBody::Join(payload::<JoinPayload>(kind, data)?),
        MessageType::Leave => MessageBody::Leave,
        MessageType::Hangup => MessageBody::Hangup,
        MessageType::Offer => MessageBody::Offer {
            sdp: payload::<SdpData>(kind, data)?.sdp,
        },
        MessageType::Answer => MessageBody::Answer {
            sdp: payload::<SdpData>(kind, data)?.sdp,
        },
        MessageType::IceCandidate => MessageBody::IceCandidate(payload(kind, data)?),
        MessageType::IceCandidatesRemoved => {
            MessageBody::IceCandidatesRemoved(payload::<CandidatesData>(kind, data)?.candidates)
        }
        MessageType::Heartbeat => MessageBody::Heartbeat,
        MessageType::HeartbeatAck => MessageBody::HeartbeatAck,
        MessageType::RoomJoined => {
            MessageBody::RoomJoined(payload::<RoomJoinedPayload>(kind, data)?)
        }
    })
}

fn payload<T: DeserializeOwned>(kind: MessageType, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload {
        kind: kind.as_str(),
        source,
    })
}
