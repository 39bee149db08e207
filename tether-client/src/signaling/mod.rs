mod signaling_handler;
mod signaling_output;
mod signaling_session;

pub use signaling_handler::*;
pub use signaling_output::*;
pub use signaling_session::*;
