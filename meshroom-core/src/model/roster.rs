use crate::model::connection::ConnectionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One occupied streamer slot as seen by room members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamerInfo {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

/// Authoritative view of the room, rebuilt after every slot mutation.
///
/// Streamers are listed in the order their slots were granted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub streamers: Vec<StreamerInfo>,
    pub capacity: usize,
    pub viewer_count: usize,
    pub total_connected: usize,
    pub available_slots: usize,
}

impl RosterSnapshot {
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.streamers
            .iter()
            .any(|s| &s.connection_id == connection_id)
    }

    pub fn streamer_ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.streamers.iter().map(|s| &s.connection_id)
    }

    pub fn is_full(&self) -> bool {
        self.available_slots == 0
    }
}
