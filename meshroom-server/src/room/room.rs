use crate::room::registry::{Outbound, RoomRegistry, Target};
use crate::room::room_command::RoomCommand;
use crate::signaling::SignalingOutput;
use meshroom_core::ConnectionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Actor owning the room registry. All room mutations run on this task.
pub struct Room {
    registry: RoomRegistry,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
}

impl Room {
    pub fn new(
        capacity: usize,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            registry: RoomRegistry::new(capacity),
            command_rx,
            signaling,
        }
    }

    pub async fn run(mut self) {
        info!(
            "Room event loop started (capacity {})",
            self.registry.capacity()
        );

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Command channel closed. Room event loop finished");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        let outbound = match cmd {
            RoomCommand::Join {
                connection_id,
                identity,
            } => self.registry.join(connection_id, identity),

            RoomCommand::RequestSlot { connection_id } => {
                self.registry.request_streamer_slot(connection_id)
            }

            RoomCommand::ReleaseSlot { connection_id } => {
                self.registry.release_slot(connection_id)
            }

            RoomCommand::Disconnect { connection_id } => self.registry.disconnect(connection_id),

            RoomCommand::Stats { reply } => {
                let _ = reply.send(self.registry.snapshot());
                return;
            }
        };

        self.dispatch(outbound).await;
    }

    async fn dispatch(&self, outbound: Vec<Outbound>) {
        for Outbound { target, message } in outbound {
            let recipients: Vec<ConnectionId> = match target {
                Target::Connection(id) => vec![id],
                Target::Room => self.registry.members().copied().collect(),
                Target::RoomExcept(excluded) => self
                    .registry
                    .members()
                    .filter(|id| **id != excluded)
                    .copied()
                    .collect(),
            };

            debug!("{} -> {} recipient(s)", message.kind(), recipients.len());

            for id in recipients {
                if !self.signaling.send(&id, message.clone()).await {
                    warn!("Dropped {} for closed connection {}", message.kind(), id);
                }
            }
        }
    }
}
