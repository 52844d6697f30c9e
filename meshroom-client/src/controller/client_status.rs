use crate::session::SessionState;
use meshroom_core::{ConnectionId, RosterSnapshot};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    NotStreaming,
    RequestingJoin,
    Streaming,
}

/// Observable state of the room client, republished after every change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientStatus {
    pub state: StreamState,
    pub connection_id: Option<ConnectionId>,
    pub position: Option<usize>,
    pub roster: Option<RosterSnapshot>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub last_error: Option<String>,
    pub peers: BTreeMap<ConnectionId, SessionState>,
    pub can_join: bool,
}
