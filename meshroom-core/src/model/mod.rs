mod connection;
mod identity;
mod roster;
mod signaling;

pub use connection::ConnectionId;
pub use identity::Identity;
pub use roster::{RosterSnapshot, StreamerInfo};
pub use signaling::{
    ClientMessage, IceCandidate, IceServerConfig, RejectReason, SdpKind, ServerMessage,
    SessionDescription,
};
