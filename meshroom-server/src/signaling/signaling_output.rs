use async_trait::async_trait;
use meshroom_core::{ConnectionId, ServerMessage};

/// Delivery seam between room logic and the connected sockets.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queues `message` for one connection. Returns `false` if the connection is gone.
    async fn send(&self, connection_id: &ConnectionId, message: ServerMessage) -> bool;
}
