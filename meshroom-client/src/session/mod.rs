mod peer_session;
mod session_context;
mod session_state;

pub use peer_session::*;
pub use session_context::*;
pub use session_state::*;
