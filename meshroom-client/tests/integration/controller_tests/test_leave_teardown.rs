use meshroom_client::{ChannelEvent, StreamState};
use meshroom_core::{ConnectionId, ServerMessage};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{SinkCall, advance, roster, settle, start_client, test_config};

#[tokio::test(start_paused = true)]
async fn test_leave_releases_everything() {
    init_tracing();
    let client = start_client(test_config()).await;
    let (a, b) = (ConnectionId::new(), ConnectionId::new());

    client.join_as_streamer(&[a, b]).await;
    advance(Duration::from_secs(1)).await;

    client.handle.leave().await.unwrap();
    settle().await;

    let status = client.status();
    assert_eq!(status.state, StreamState::NotStreaming);
    assert_eq!(status.position, None);
    assert!(status.peers.is_empty());
    assert!(!status.audio_enabled);

    assert_eq!(client.signals.slot_releases(), 1);
    assert!(client.capture.tracks().iter().all(|t| t.is_stopped()));
    assert_eq!(client.sinks.count(&SinkCall::DetachLocal), 1);
    for connection in client.platform.connections().await {
        assert!(connection.was_closed().await);
    }
}

#[tokio::test(start_paused = true)]
async fn test_leave_cancels_pending_offers() {
    init_tracing();
    let client = start_client(test_config()).await;
    let a = ConnectionId::new();

    client.join_as_streamer(&[a]).await;
    advance(Duration::from_millis(600)).await;

    client.handle.leave().await.unwrap();
    advance(Duration::from_secs(2)).await;

    assert_eq!(client.signals.offers_to(&a), 0);
    assert_eq!(client.platform.created(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leave_before_settle_cancels_reconcile() {
    init_tracing();
    let client = start_client(test_config()).await;
    let a = ConnectionId::new();

    client.join_as_streamer(&[a]).await;
    client.handle.leave().await.unwrap();
    advance(Duration::from_secs(2)).await;

    assert_eq!(client.platform.created(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leave_resets_even_when_notify_fails() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.join_as_streamer(&[ConnectionId::new()]).await;
    client.signals.break_channel();

    client.handle.leave().await.unwrap();
    settle().await;

    assert_eq!(client.state(), StreamState::NotStreaming);
    assert!(client.capture.tracks().iter().all(|t| t.is_stopped()));
}

#[tokio::test(start_paused = true)]
async fn test_leave_while_idle_sends_nothing() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.handle.leave().await.unwrap();
    settle().await;

    assert!(client.signals.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slot_released_tears_down_without_notifying() {
    init_tracing();
    let client = start_client(test_config()).await;
    let a = ConnectionId::new();

    client.join_as_streamer(&[a]).await;
    advance(Duration::from_secs(1)).await;
    client.deliver(ServerMessage::SlotReleased).await;

    assert_eq!(client.state(), StreamState::NotStreaming);
    assert_eq!(client.signals.slot_releases(), 0);
    assert!(client.status().peers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_release_acknowledgement_does_not_end_next_session() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.join_as_streamer(&[]).await;
    client.handle.leave().await.unwrap();
    settle().await;

    client.handle.request_join().await.unwrap();
    settle().await;
    client.deliver(ServerMessage::SlotReleased).await;
    assert_eq!(client.state(), StreamState::RequestingJoin);

    client
        .deliver(ServerMessage::JoinConfirmed {
            position: 1,
            snapshot: roster(&[client.self_id]),
        })
        .await;
    assert_eq!(client.state(), StreamState::Streaming);

    // A release the server starts on its own still tears down
    client.deliver(ServerMessage::SlotReleased).await;
    assert_eq!(client.state(), StreamState::NotStreaming);
    assert_eq!(client.signals.slot_releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_channel_loss_leaves_locally() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.join_as_streamer(&[ConnectionId::new()]).await;
    client.channel(ChannelEvent::Disconnected).await;

    let status = client.status();
    assert_eq!(status.state, StreamState::NotStreaming);
    assert_eq!(status.connection_id, None);
    assert_eq!(status.roster, None);
    assert!(!status.can_join);
    assert_eq!(client.signals.slot_releases(), 0);
    assert!(client.capture.tracks().iter().all(|t| t.is_stopped()));

    // A fresh welcome after reconnecting restores identity
    client.channel(ChannelEvent::Connected).await;
    client
        .deliver(ServerMessage::Welcome {
            connection_id: client.self_id,
        })
        .await;
    assert_eq!(client.status().connection_id, Some(client.self_id));
}

#[tokio::test(start_paused = true)]
async fn test_channel_closed_reports_error() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.channel(ChannelEvent::Closed).await;

    let status = client.status();
    assert_eq!(status.state, StreamState::NotStreaming);
    assert!(status.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_stops_client() {
    init_tracing();
    let client = start_client(test_config()).await;
    client.join_as_streamer(&[]).await;

    let signals = client.signals.clone();
    let task = client.task;
    drop(client.handle);

    task.await.unwrap();
    assert_eq!(signals.slot_releases(), 1);
}
