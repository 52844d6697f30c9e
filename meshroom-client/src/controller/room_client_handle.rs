use crate::controller::{ClientCommand, ClientStatus};
use crate::error::ClientError;
use tokio::sync::{mpsc, watch};

/// Cloneable front end of a running [`RoomClient`](crate::RoomClient).
#[derive(Clone)]
pub struct RoomClientHandle {
    command_tx: mpsc::Sender<ClientCommand>,
    status_rx: watch::Receiver<ClientStatus>,
}

impl RoomClientHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<ClientCommand>,
        status_rx: watch::Receiver<ClientStatus>,
    ) -> Self {
        Self {
            command_tx,
            status_rx,
        }
    }

    pub async fn request_join(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::RequestJoin).await
    }

    pub async fn leave(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::Leave).await
    }

    pub async fn toggle_audio(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::ToggleAudio).await
    }

    pub async fn toggle_video(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::ToggleVideo).await
    }

    pub async fn send(&self, cmd: ClientCommand) -> Result<(), ClientError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| ClientError::Stopped)
    }

    /// Latest published status.
    pub fn status(&self) -> ClientStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientStatus> {
        self.status_rx.clone()
    }
}
