use crate::platform::TrackKind;
use meshroom_core::{ConnectionId, IceCandidate};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Media received from a remote peer. `handle` is the platform's native track object.
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    pub handle: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SessionEventKind {
    /// `None` marks the end of candidate gathering.
    LocalCandidate(Option<IceCandidate>),
    LinkStateChanged(LinkState),
    RemoteTrack(RemoteTrack),
    NegotiationDeadline { round: u64 },
}

/// An event for the session identified by `(remote, epoch)`.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub remote: ConnectionId,
    pub epoch: u64,
    pub kind: SessionEventKind,
}

/// Callback target handed to a media connection.
#[derive(Clone)]
pub struct ConnectionEvents {
    remote: ConnectionId,
    epoch: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ConnectionEvents {
    pub fn new(remote: ConnectionId, epoch: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { remote, epoch, tx }
    }

    pub fn remote(&self) -> ConnectionId {
        self.remote
    }

    pub fn local_candidate(&self, candidate: Option<IceCandidate>) {
        self.emit(SessionEventKind::LocalCandidate(candidate));
    }

    pub fn link_state(&self, state: LinkState) {
        self.emit(SessionEventKind::LinkStateChanged(state));
    }

    pub fn remote_track(&self, track: RemoteTrack) {
        self.emit(SessionEventKind::RemoteTrack(track));
    }

    pub(crate) fn emit(&self, kind: SessionEventKind) {
        let _ = self.tx.send(SessionEvent {
            remote: self.remote,
            epoch: self.epoch,
            kind,
        });
    }
}
