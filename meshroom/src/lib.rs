pub use meshroom_core::model::{ConnectionId, Identity, RosterSnapshot};

pub mod model {
    pub use meshroom_core::model::*;
}

pub mod defaults {
    pub use meshroom_core::utils::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use meshroom_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshroom_client::*;
}
