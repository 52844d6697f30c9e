use crate::config::CaptureConstraints;
use crate::error::{CaptureError, NegotiationError, PlaybackError};
use crate::platform::{ConnectionEvents, RemoteTrack};
use async_trait::async_trait;
use meshroom_core::{ConnectionId, IceCandidate, IceServerConfig, SessionDescription};
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A captured local track shared by every peer connection.
pub trait LocalTrack: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn is_enabled(&self) -> bool;
    /// Mutes or unmutes the track without renegotiating.
    fn set_enabled(&self, enabled: bool);
    fn stop(&self);
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait CaptureDevices: Send + Sync {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<Arc<dyn LocalTrack>>, CaptureError>;
}

/// One peer-to-peer media connection.
///
/// `create_offer` and `create_answer` also install the result as the local description.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_remote_description(
        &self,
        descriptor: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self);
}

#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Opens a connection whose callbacks report through `events`.
    async fn create_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>, NegotiationError>;
}

/// Where local preview and remote media are rendered.
pub trait MediaSinks: Send + Sync {
    fn attach_local(&self, tracks: &[Arc<dyn LocalTrack>]);
    fn play_local(&self) -> Result<(), PlaybackError>;
    fn detach_local(&self);
    fn attach_remote(&self, remote: ConnectionId, track: RemoteTrack);
    fn detach_remote(&self, remote: ConnectionId);
}
