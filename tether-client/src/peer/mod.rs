mod peer_command;
mod peer_handle;
mod peer_session;

pub use peer_command::*;
pub use peer_handle::*;
pub use peer_session::*;
