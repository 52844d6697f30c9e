use chrono::Utc;
use meshroom_client::{
    ChannelEvent, ClientConfig, ClientDeps, ClientStatus, RoomClient, RoomClientHandle,
    StreamState,
};
use meshroom_core::{ConnectionId, RosterSnapshot, ServerMessage, StreamerInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::{MockCapture, MockPlatform, MockSignalSink, MockSinks};

pub const CAPACITY: usize = 4;

/// A running [`RoomClient`] wired to mocks, with its inbound channel exposed.
pub struct TestClient {
    pub handle: RoomClientHandle,
    pub inbound_tx: mpsc::UnboundedSender<ChannelEvent>,
    pub platform: MockPlatform,
    pub capture: MockCapture,
    pub sinks: MockSinks,
    pub signals: MockSignalSink,
    pub self_id: ConnectionId,
    pub task: JoinHandle<()>,
}

/// Deterministic timings: no jitter, short settle.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        settle_delay: Duration::from_millis(500),
        offer_jitter: (Duration::from_millis(300), Duration::from_millis(300)),
        ..ClientConfig::default()
    }
}

pub async fn start_client(config: ClientConfig) -> TestClient {
    let platform = MockPlatform::new();
    let capture = MockCapture::new();
    let sinks = MockSinks::new();
    let signals = MockSignalSink::new();

    let deps = ClientDeps {
        platform: Arc::new(platform.clone()),
        capture: Arc::new(capture.clone()),
        sinks: Arc::new(sinks.clone()),
        signals: Arc::new(signals.clone()),
    };

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (client, handle) = RoomClient::new(config, deps, inbound_rx);
    let task = tokio::spawn(client.run());

    let self_id = ConnectionId::new();
    let test_client = TestClient {
        handle,
        inbound_tx,
        platform,
        capture,
        sinks,
        signals,
        self_id,
        task,
    };

    test_client.channel(ChannelEvent::Connected).await;
    test_client
        .deliver(ServerMessage::Welcome {
            connection_id: self_id,
        })
        .await;
    test_client
}

impl TestClient {
    pub async fn channel(&self, event: ChannelEvent) {
        self.inbound_tx.send(event).expect("client stopped");
        settle().await;
    }

    pub async fn deliver(&self, msg: ServerMessage) {
        self.channel(ChannelEvent::Message(msg)).await;
    }

    pub fn status(&self) -> ClientStatus {
        self.handle.status()
    }

    pub fn state(&self) -> StreamState {
        self.handle.status().state
    }

    /// Requests a slot and confirms it with `others` already streaming.
    pub async fn join_as_streamer(&self, others: &[ConnectionId]) {
        self.handle.request_join().await.expect("client stopped");
        settle().await;
        assert_eq!(self.signals.slot_requests(), 1);

        let mut streamers = others.to_vec();
        streamers.push(self.self_id);
        self.deliver(ServerMessage::JoinConfirmed {
            position: streamers.len(),
            snapshot: roster(&streamers),
        })
        .await;
        assert_eq!(self.state(), StreamState::Streaming);
    }
}

/// Lets spawned tasks run. Under a paused clock this advances only a millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

pub fn streamer(id: ConnectionId) -> StreamerInfo {
    StreamerInfo {
        connection_id: id,
        user_id: format!("user-{}", id),
        username: format!("name-{}", id),
        joined_at: Utc::now(),
    }
}

pub fn roster(streamers: &[ConnectionId]) -> RosterSnapshot {
    RosterSnapshot {
        streamers: streamers.iter().copied().map(streamer).collect(),
        capacity: CAPACITY,
        viewer_count: 0,
        total_connected: streamers.len(),
        available_slots: CAPACITY.saturating_sub(streamers.len()),
    }
}
