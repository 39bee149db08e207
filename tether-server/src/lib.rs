mod config;
mod server;
pub mod signaling;

pub use config::ServerConfig;
pub use server::{router, serve, serve_on};
pub use signaling::{SignalingService, ws_handler};
