use meshroom_client::{CaptureError, LocalTrack, StreamState, TrackKind};
use meshroom_core::{ClientMessage, ConnectionId, RejectReason, ServerMessage};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{SinkCall, advance, roster, settle, start_client, test_config};

#[tokio::test(start_paused = true)]
async fn test_request_join_captures_then_requests_slot() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.handle.request_join().await.unwrap();
    settle().await;

    assert_eq!(client.capture.calls(), 1);
    assert_eq!(client.state(), StreamState::RequestingJoin);
    assert_eq!(
        client.signals.sent(),
        vec![ClientMessage::RequestStreamerSlot]
    );
    assert_eq!(client.status().connection_id, Some(client.self_id));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_join_request_ignored() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.handle.request_join().await.unwrap();
    client.handle.request_join().await.unwrap();
    settle().await;

    assert_eq!(client.capture.calls(), 1);
    assert_eq!(client.signals.slot_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_never_reaches_server() {
    init_tracing();
    let client = start_client(test_config()).await;
    client.capture.fail_with(CaptureError::PermissionDenied);

    client.handle.request_join().await.unwrap();
    settle().await;

    let status = client.status();
    assert_eq!(status.state, StreamState::NotStreaming);
    assert_eq!(
        status.last_error.as_deref(),
        Some(CaptureError::PermissionDenied.to_string().as_str())
    );
    assert!(client.signals.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_starts_preview() {
    init_tracing();
    let client = start_client(test_config()).await;
    let other = ConnectionId::new();

    client.join_as_streamer(&[other]).await;

    let status = client.status();
    assert_eq!(status.position, Some(2));
    assert!(status.audio_enabled);
    assert!(status.video_enabled);
    assert!(!status.can_join);
    assert_eq!(client.sinks.count(&SinkCall::AttachLocal(2)), 1);
    assert_eq!(client.sinks.count(&SinkCall::PlayLocal), 1);
}

#[tokio::test(start_paused = true)]
async fn test_preview_retried_until_playing() {
    init_tracing();
    let client = start_client(test_config()).await;
    client.sinks.fail_play(2);

    client.join_as_streamer(&[]).await;
    advance(Duration::from_secs(2)).await;

    assert_eq!(client.sinks.count(&SinkCall::PlayLocal), 3);
    assert_eq!(client.state(), StreamState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_preview_gives_up_after_retries() {
    init_tracing();
    let config = test_config();
    let retries = config.preview_retries as usize;
    let client = start_client(config).await;
    client.sinks.fail_play(100);

    client.join_as_streamer(&[]).await;
    advance(Duration::from_secs(5)).await;

    assert_eq!(client.sinks.count(&SinkCall::PlayLocal), retries + 1);
    // Preview stays attached; streaming continues
    assert_eq!(client.sinks.count(&SinkCall::DetachLocal), 0);
    assert_eq!(client.state(), StreamState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_rejection_releases_capture() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.handle.request_join().await.unwrap();
    settle().await;
    client
        .deliver(ServerMessage::JoinRejected {
            reason: RejectReason::SlotUnavailable,
            message: "room full, max 4 streamers".into(),
        })
        .await;

    let status = client.status();
    assert_eq!(status.state, StreamState::NotStreaming);
    assert_eq!(
        status.last_error.as_deref(),
        Some("room full, max 4 streamers")
    );
    assert!(client.capture.tracks().iter().all(|t| t.is_stopped()));
    assert_eq!(client.signals.slot_releases(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_request_confirmation_ignored() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.handle.request_join().await.unwrap();
    settle().await;
    client.handle.leave().await.unwrap();
    settle().await;
    assert_eq!(client.signals.slot_releases(), 1);

    // The server granted the slot before it saw our leave, then released it
    client
        .deliver(ServerMessage::JoinConfirmed {
            position: 1,
            snapshot: roster(&[client.self_id]),
        })
        .await;
    client.deliver(ServerMessage::SlotReleased).await;

    assert_eq!(client.state(), StreamState::NotStreaming);
    assert_eq!(client.signals.slot_releases(), 1);
    assert_eq!(client.sinks.count(&SinkCall::AttachLocal(2)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_before_release_lands_keeps_new_slot() {
    init_tracing();
    let client = start_client(test_config()).await;
    let me = client.self_id;

    client.handle.request_join().await.unwrap();
    settle().await;
    client.handle.leave().await.unwrap();
    settle().await;
    client.handle.request_join().await.unwrap();
    settle().await;
    assert_eq!(client.signals.slot_requests(), 2);

    // Replies to request, leave, request, in server order
    client
        .deliver(ServerMessage::JoinConfirmed {
            position: 1,
            snapshot: roster(&[me]),
        })
        .await;
    client
        .deliver(ServerMessage::StreamerDeparted {
            id: me,
            username: "me".into(),
        })
        .await;
    client.deliver(ServerMessage::SlotReleased).await;
    client
        .deliver(ServerMessage::RosterUpdate {
            snapshot: roster(&[]),
        })
        .await;
    client
        .deliver(ServerMessage::JoinConfirmed {
            position: 1,
            snapshot: roster(&[me]),
        })
        .await;
    client
        .deliver(ServerMessage::RosterUpdate {
            snapshot: roster(&[me]),
        })
        .await;
    advance(Duration::from_secs(2)).await;

    let status = client.status();
    assert_eq!(status.state, StreamState::Streaming);
    assert_eq!(status.position, Some(1));
    assert_eq!(status.last_error, None);
    assert_eq!(client.signals.slot_releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_request_rejection_ignored() {
    init_tracing();
    let client = start_client(test_config()).await;

    client.handle.request_join().await.unwrap();
    settle().await;
    client.handle.leave().await.unwrap();
    settle().await;
    client.handle.request_join().await.unwrap();
    settle().await;

    // The first request lost the race for the last slot; the second one wins it
    client
        .deliver(ServerMessage::JoinRejected {
            reason: RejectReason::SlotUnavailable,
            message: "room full, max 4 streamers".into(),
        })
        .await;
    assert_eq!(client.state(), StreamState::RequestingJoin);

    client
        .deliver(ServerMessage::JoinConfirmed {
            position: 4,
            snapshot: roster(&[client.self_id]),
        })
        .await;

    let status = client.status();
    assert_eq!(status.state, StreamState::Streaming);
    assert_eq!(status.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_confirmation_releases_slot() {
    init_tracing();
    let client = start_client(test_config()).await;

    client
        .deliver(ServerMessage::JoinConfirmed {
            position: 1,
            snapshot: roster(&[client.self_id]),
        })
        .await;
    assert_eq!(client.signals.slot_releases(), 1);

    // Its acknowledgement must not disturb a later join
    client.deliver(ServerMessage::SlotReleased).await;
    client.join_as_streamer(&[]).await;
    assert_eq!(client.state(), StreamState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_toggles_flip_single_track() {
    init_tracing();
    let client = start_client(test_config()).await;
    client.join_as_streamer(&[]).await;

    client.handle.toggle_audio().await.unwrap();
    settle().await;

    let status = client.status();
    assert!(!status.audio_enabled);
    assert!(status.video_enabled);
    let audio = client.capture.track(TrackKind::Audio).unwrap();
    assert!(!audio.is_enabled());

    client.handle.toggle_video().await.unwrap();
    client.handle.toggle_audio().await.unwrap();
    settle().await;

    let status = client.status();
    assert!(status.audio_enabled);
    assert!(!status.video_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_can_join_follows_roster() {
    init_tracing();
    let client = start_client(test_config()).await;

    client
        .deliver(ServerMessage::RosterUpdate {
            snapshot: roster(&[ConnectionId::new()]),
        })
        .await;
    assert!(client.status().can_join);

    let full: Vec<ConnectionId> = (0..4).map(|_| ConnectionId::new()).collect();
    client
        .deliver(ServerMessage::RosterUpdate {
            snapshot: roster(&full),
        })
        .await;
    assert!(!client.status().can_join);
}
