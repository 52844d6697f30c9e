/// Local capture failures. These never reach the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("permission denied, allow camera and microphone access")]
    PermissionDenied,

    #[error("camera or microphone not found")]
    NotFound,

    #[error("camera or microphone is in use by another application")]
    Busy,

    #[error("capture failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// A signal arrived for a session that is not expecting it.
    #[error("stale {0} ignored")]
    StaleSignal(&'static str),

    #[error("media platform error: {0}")]
    Platform(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl NegotiationError {
    pub fn platform(e: impl std::fmt::Display) -> Self {
        NegotiationError::Platform(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("signaling channel closed")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("playback failed: {0}")]
pub struct PlaybackError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("room client stopped")]
    Stopped,
}
