use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use anyhow::Context;
use meshroom_core::RosterSnapshot;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Cloneable mailbox address of the running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    command_tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Spawns the room actor on the current runtime. A zero mailbox size is raised to one.
    pub fn spawn(
        capacity: usize,
        mailbox_size: usize,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        info!("Creating room with {} streamer slots", capacity);
        let (command_tx, command_rx) = mpsc::channel(mailbox_size.max(1));

        let room = Room::new(capacity, command_rx, signaling);
        tokio::spawn(room.run());

        Self { command_tx }
    }

    pub fn sender(&self) -> mpsc::Sender<RoomCommand> {
        self.command_tx.clone()
    }

    pub async fn send(&self, cmd: RoomCommand) -> anyhow::Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .context("room actor stopped")
    }

    pub async fn stats(&self) -> anyhow::Result<RosterSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Stats { reply }).await?;
        rx.await.context("room actor dropped the stats request")
    }
}
