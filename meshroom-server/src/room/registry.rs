use chrono::{DateTime, Utc};
use meshroom_core::{
    ConnectionId, Identity, RejectReason, RosterSnapshot, ServerMessage, StreamerInfo,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Why a slot request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("join the room before requesting a streamer slot")]
    NotRegistered,

    #[error("already streaming")]
    AlreadyStreaming,

    #[error("room full, max {capacity} streamers")]
    SlotUnavailable { capacity: usize },
}

impl SlotError {
    pub fn reason(&self) -> RejectReason {
        match self {
            SlotError::NotRegistered => RejectReason::NotRegistered,
            SlotError::AlreadyStreaming => RejectReason::AlreadyStreaming,
            SlotError::SlotUnavailable { .. } => RejectReason::SlotUnavailable,
        }
    }
}

/// Recipients of an outbound message, resolved against the members present at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Connection(ConnectionId),
    Room,
    RoomExcept(ConnectionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub message: ServerMessage,
}

impl Outbound {
    fn to(connection_id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            target: Target::Connection(connection_id),
            message,
        }
    }

    fn room(message: ServerMessage) -> Self {
        Self {
            target: Target::Room,
            message,
        }
    }

    fn room_except(connection_id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            target: Target::RoomExcept(connection_id),
            message,
        }
    }
}

#[derive(Debug, Clone)]
struct StreamerSlot {
    connection_id: ConnectionId,
    identity: Identity,
    joined_at: DateTime<Utc>,
}

/// Authoritative bookkeeping for the single shared room.
///
/// Every mutation returns the messages it produced, in delivery order. The registry never
/// performs I/O; the room actor owns it and dispatches the result.
#[derive(Debug)]
pub struct RoomRegistry {
    capacity: usize,
    slots: Vec<StreamerSlot>,
    viewers: HashSet<ConnectionId>,
    connected: HashMap<ConnectionId, Identity>,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            viewers: HashSet::new(),
            connected: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn streamer_count(&self) -> usize {
        self.slots.len()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    pub fn is_streaming(&self, connection_id: &ConnectionId) -> bool {
        self.slot_index(connection_id).is_some()
    }

    pub fn is_viewer(&self, connection_id: &ConnectionId) -> bool {
        self.viewers.contains(connection_id)
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connected.contains_key(connection_id)
    }

    pub fn identity(&self, connection_id: &ConnectionId) -> Option<&Identity> {
        self.connected.get(connection_id)
    }

    /// Connections that receive room broadcasts.
    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connected.keys()
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            streamers: self
                .slots
                .iter()
                .map(|slot| StreamerInfo {
                    connection_id: slot.connection_id,
                    user_id: slot.identity.id.clone(),
                    username: slot.identity.username.clone(),
                    joined_at: slot.joined_at,
                })
                .collect(),
            capacity: self.capacity,
            viewer_count: self.viewers.len(),
            total_connected: self.connected.len(),
            available_slots: self.capacity.saturating_sub(self.slots.len()),
        }
    }

    /// Registers a connection as a room member. New members start as viewers.
    pub fn join(&mut self, connection_id: ConnectionId, identity: Identity) -> Vec<Outbound> {
        let username = identity.username.clone();

        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.connection_id == connection_id)
        {
            slot.identity = identity.clone();
        } else {
            self.viewers.insert(connection_id);
        }
        self.connected.insert(connection_id, identity);

        info!(
            "{} joined the room ({} connected, {} streaming)",
            username,
            self.connected.len(),
            self.slots.len()
        );

        vec![
            Outbound::room_except(connection_id, ServerMessage::UserJoined { username }),
            Outbound::room(self.roster_update()),
        ]
    }

    /// Grants a slot and returns its 1-based position. Leaves state untouched on error.
    pub fn claim_slot(&mut self, connection_id: ConnectionId) -> Result<usize, SlotError> {
        let Some(identity) = self.connected.get(&connection_id) else {
            return Err(SlotError::NotRegistered);
        };
        if self.is_streaming(&connection_id) {
            return Err(SlotError::AlreadyStreaming);
        }
        if self.slots.len() >= self.capacity {
            return Err(SlotError::SlotUnavailable {
                capacity: self.capacity,
            });
        }

        self.slots.push(StreamerSlot {
            connection_id,
            identity: identity.clone(),
            joined_at: Utc::now(),
        });
        self.viewers.remove(&connection_id);

        Ok(self.slots.len())
    }

    pub fn request_streamer_slot(&mut self, connection_id: ConnectionId) -> Vec<Outbound> {
        let position = match self.claim_slot(connection_id) {
            Ok(position) => position,
            Err(e) => {
                debug!("Slot request from {} rejected: {}", connection_id, e);
                return vec![Outbound::to(
                    connection_id,
                    ServerMessage::JoinRejected {
                        reason: e.reason(),
                        message: e.to_string(),
                    },
                )];
            }
        };

        let username = self.slots[position - 1].identity.username.clone();
        info!(
            "{} started streaming ({}/{})",
            username,
            self.slots.len(),
            self.capacity
        );

        let snapshot = self.snapshot();
        vec![
            Outbound::to(
                connection_id,
                ServerMessage::JoinConfirmed {
                    position,
                    snapshot: snapshot.clone(),
                },
            ),
            Outbound::room_except(
                connection_id,
                ServerMessage::StreamerArrived {
                    id: connection_id,
                    username,
                },
            ),
            Outbound::room(ServerMessage::RosterUpdate { snapshot }),
        ]
    }

    /// Frees the connection's slot. Nothing is emitted when it holds none.
    pub fn release_slot(&mut self, connection_id: ConnectionId) -> Vec<Outbound> {
        let Some(slot) = self.remove_slot(&connection_id) else {
            return Vec::new();
        };
        if self.connected.contains_key(&connection_id) {
            self.viewers.insert(connection_id);
        }

        info!("{} stopped streaming", slot.identity.username);

        vec![
            Outbound::room(ServerMessage::StreamerDeparted {
                id: connection_id,
                username: slot.identity.username,
            }),
            Outbound::to(connection_id, ServerMessage::SlotReleased),
            Outbound::room(self.roster_update()),
        ]
    }

    /// Removes every trace of the connection. Idempotent.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Vec<Outbound> {
        let slot = self.remove_slot(&connection_id);
        self.viewers.remove(&connection_id);
        let identity = self.connected.remove(&connection_id);

        let mut outbound = Vec::new();
        if let Some(slot) = &slot {
            outbound.push(Outbound::room(ServerMessage::StreamerDeparted {
                id: connection_id,
                username: slot.identity.username.clone(),
            }));
        }

        let Some(identity) = identity.or(slot.map(|s| s.identity)) else {
            return outbound;
        };

        info!(
            "{} disconnected ({} connected, {} streaming)",
            identity.username,
            self.connected.len(),
            self.slots.len()
        );

        outbound.push(Outbound::room(ServerMessage::UserLeft {
            username: identity.username,
        }));
        outbound.push(Outbound::room(self.roster_update()));
        outbound
    }

    fn roster_update(&self) -> ServerMessage {
        ServerMessage::RosterUpdate {
            snapshot: self.snapshot(),
        }
    }

    fn slot_index(&self, connection_id: &ConnectionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| &slot.connection_id == connection_id)
    }

    fn remove_slot(&mut self, connection_id: &ConnectionId) -> Option<StreamerSlot> {
        self.slot_index(connection_id)
            .map(|index| self.slots.remove(index))
    }
}
