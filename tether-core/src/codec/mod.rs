mod error;
mod message;
mod message_type;
mod wire;

pub use error::{DecodeError, EncodeError};
pub use message::{JoinPayload, MessageBody, RoomJoinedPayload, SignalingMessage, UserInfo};
pub use message_type::MessageType;
pub use wire::{decode, encode};
