use crate::model::connection::ConnectionId;
use crate::model::identity::Identity;
use crate::model::roster::RosterSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Opaque session descriptor, shaped like the browser's `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickle ICE candidate, shaped like `RTCIceCandidateInit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Why the server refused a streamer slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    NotRegistered,
    AlreadyStreaming,
    SlotUnavailable,
}

/// Frames sent by a client over its channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Join {
        identity: Identity,
    },
    RequestStreamerSlot,
    LeaveSlot,
    Offer {
        target_id: ConnectionId,
        descriptor: SessionDescription,
    },
    Answer {
        target_id: ConnectionId,
        descriptor: SessionDescription,
    },
    IceCandidate {
        target_id: ConnectionId,
        candidate: IceCandidate,
    },
}

/// Frames sent by the server to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Welcome {
        connection_id: ConnectionId,
    },
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    RosterUpdate {
        snapshot: RosterSnapshot,
    },
    JoinConfirmed {
        position: usize,
        snapshot: RosterSnapshot,
    },
    JoinRejected {
        reason: RejectReason,
        message: String,
    },
    StreamerArrived {
        id: ConnectionId,
        username: String,
    },
    StreamerDeparted {
        id: ConnectionId,
        username: String,
    },
    SlotReleased,
    UserJoined {
        username: String,
    },
    UserLeft {
        username: String,
    },
    Offer {
        from: ConnectionId,
        from_username: Option<String>,
        descriptor: SessionDescription,
    },
    Answer {
        from: ConnectionId,
        from_username: Option<String>,
        descriptor: SessionDescription,
    },
    IceCandidate {
        from: ConnectionId,
        from_username: Option<String>,
        candidate: IceCandidate,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::IceConfig { .. } => "ice-config",
            ServerMessage::RosterUpdate { .. } => "roster-update",
            ServerMessage::JoinConfirmed { .. } => "join-confirmed",
            ServerMessage::JoinRejected { .. } => "join-rejected",
            ServerMessage::StreamerArrived { .. } => "streamer-arrived",
            ServerMessage::StreamerDeparted { .. } => "streamer-departed",
            ServerMessage::SlotReleased => "slot-released",
            ServerMessage::UserJoined { .. } => "user-joined",
            ServerMessage::UserLeft { .. } => "user-left",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "ice-candidate",
        }
    }
}
