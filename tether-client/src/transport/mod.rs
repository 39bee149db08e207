mod transport_client;
mod transport_config;
mod transport_event;
mod ws_dialer;

pub use transport_client::*;
pub use transport_config::*;
pub use transport_event::*;
pub use ws_dialer::*;
