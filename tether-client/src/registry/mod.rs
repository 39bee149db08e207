mod registry_bridge;
mod registry_command;
mod registry_handle;
mod session_observer;
mod session_registry;

pub use registry_bridge::*;
pub use registry_command::*;
pub use registry_handle::*;
pub use session_observer::*;
pub use session_registry::*;
