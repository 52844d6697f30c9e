use meshroom_core::IceServerConfig;
use meshroom_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use std::time::Duration;

/// What to ask the capture devices for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    /// How long an unanswered offer blocks a new one for the same remote.
    pub negotiation_timeout: Duration,
    /// Delay between slot confirmation and the first mesh reconciliation.
    pub settle_delay: Duration,
    /// Random delay range before offering to a streamer found in a roster.
    pub offer_jitter: (Duration, Duration),
    pub arrival_offer_delay: Duration,
    pub preview_retry_delay: Duration,
    pub preview_retries: u32,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    /// Used until the server pushes its own list.
    pub ice_servers: Vec<IceServerConfig>,
    pub capture: CaptureConstraints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:5050/ws".to_owned(),
            negotiation_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(500),
            offer_jitter: (Duration::from_millis(300), Duration::from_millis(700)),
            arrival_offer_delay: Duration::from_millis(800),
            preview_retry_delay: Duration::from_millis(200),
            preview_retries: 3,
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            capture: CaptureConstraints::default(),
        }
    }
}
