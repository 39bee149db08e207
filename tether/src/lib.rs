pub use tether_core::model::{Contact, ContactId};

pub mod model {
    pub use tether_core::model::*;
}

pub mod codec {
    pub use tether_core::codec::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use tether_client::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use tether_server::*;
}
