pub mod codec;
pub mod model;

pub use codec::{
    DecodeError, EncodeError, JoinPayload, MessageBody, MessageType, RoomJoinedPayload,
    SignalingMessage, UserInfo, decode, encode,
};
pub use model::*;
