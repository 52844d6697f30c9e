use crate::platform::{LocalTrack, MediaPlatform, MediaSinks, SessionEvent, SignalSink};
use meshroom_core::IceServerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Collaborators a session borrows from its owning controller for one operation.
pub struct SessionContext<'a> {
    pub platform: &'a dyn MediaPlatform,
    pub signals: &'a dyn SignalSink,
    pub sinks: &'a dyn MediaSinks,
    pub local_tracks: &'a [Arc<dyn LocalTrack>],
    pub ice_servers: &'a [IceServerConfig],
    pub events: &'a mpsc::UnboundedSender<SessionEvent>,
    pub negotiation_timeout: Duration,
}
