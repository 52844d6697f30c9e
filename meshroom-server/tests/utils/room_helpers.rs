use anyhow::Result;
use meshroom_core::{ConnectionId, Identity, RosterSnapshot, ServerMessage};
use meshroom_server::{RoomCommand, RoomHandle};
use std::time::Duration;
use tokio::sync::mpsc;

use super::mock_signaling::Delivery;

/// Timeout for a single expected delivery (ms).
pub const DELIVERY_TIMEOUT_MS: u64 = 2000;

pub async fn join_as(room: &RoomHandle, name: &str) -> Result<ConnectionId> {
    let connection_id = ConnectionId::new();
    room.send(RoomCommand::Join {
        connection_id,
        identity: Identity::new(format!("user-{name}"), name),
    })
    .await?;
    Ok(connection_id)
}

/// Waits for the next frame of `kind` addressed to `to`, skipping everything else.
pub async fn wait_for_kind(
    rx: &mut mpsc::UnboundedReceiver<Delivery>,
    to: &ConnectionId,
    kind: &str,
) -> Result<ServerMessage> {
    let deadline = Duration::from_millis(DELIVERY_TIMEOUT_MS);

    tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await {
                Some(delivery) if &delivery.to == to && delivery.message.kind() == kind => {
                    return Ok(delivery.message);
                }
                Some(_) => continue,
                None => anyhow::bail!("Delivery channel closed"),
            }
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("Timeout waiting for {kind}"))?
}

/// Round-trips a stats query so every earlier command has been processed.
pub async fn settle(room: &RoomHandle) -> Result<RosterSnapshot> {
    room.stats().await
}
