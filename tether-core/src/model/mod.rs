mod chat;
mod contact;
mod room;
mod session;
mod state;

pub use chat::ChatMessage;
pub use contact::{Contact, ContactId};
pub use room::{DEFAULT_STUN_ADDR, IceServerConfig, Room};
pub use session::{IceCandidate, SdpType, SessionDescription};
pub use state::{ConnectionState, NegotiationState};
