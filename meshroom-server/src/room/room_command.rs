use meshroom_core::{ConnectionId, Identity, RosterSnapshot};
use tokio::sync::oneshot;

/// Commands delivered to the room actor by the WebSocket layer.
#[derive(Debug)]
pub enum RoomCommand {
    /// The connection announced its identity and entered the room.
    Join {
        connection_id: ConnectionId,
        identity: Identity,
    },

    /// The connection asks to become a streamer.
    RequestSlot { connection_id: ConnectionId },

    /// The connection gives its streamer slot back.
    ReleaseSlot { connection_id: ConnectionId },

    /// The WebSocket closed.
    Disconnect { connection_id: ConnectionId },

    /// Read-only query for the status endpoint.
    Stats { reply: oneshot::Sender<RosterSnapshot> },
}
