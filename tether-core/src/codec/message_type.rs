use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Join,
    Leave,
    Hangup,
    Offer,
    Answer,
    IceCandidate,
    IceCandidatesRemoved,
    Heartbeat,
    HeartbeatAck,
    RoomJoined,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Hangup => "hangup",
            MessageType::Offer => "offer",
            MessageType::Answer => "answer",
            MessageType::IceCandidate => "ice-candidate",
            MessageType::IceCandidatesRemoved => "ice-candidates-removed",
            MessageType::Heartbeat => "heartbeat",
            MessageType::HeartbeatAck => "heartbeat-ack",
            MessageType::RoomJoined => "room-joined",
        }
    }
}

impl FromStr for MessageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "join" => MessageType::Join,
            "leave" => MessageType::Leave,
            "hangup" => MessageType::Hangup,
            "offer" => MessageType::Offer,
            "answer" => MessageType::Answer,
            "ice-candidate" => MessageType::IceCandidate,
            "ice-candidates-removed" => MessageType::IceCandidatesRemoved,
            "heartbeat" => MessageType::Heartbeat,
            "heartbeat-ack" => MessageType::HeartbeatAck,
            "room-joined" => MessageType::RoomJoined,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
