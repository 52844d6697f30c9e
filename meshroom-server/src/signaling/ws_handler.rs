use crate::room::RoomCommand;
use crate::server::AppState;
use crate::signaling::{RelaySignal, relay_signal};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use meshroom_core::{ClientMessage, ConnectionId, Identity, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_peer(connection_id, tx);
    state
        .signaling
        .send_signal(&connection_id, &ServerMessage::Welcome { connection_id });
    state.signaling.send_signal(
        &connection_id,
        &ServerMessage::IceConfig {
            ice_servers: state.signaling.get_ice_servers(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            let mut identity: Option<Identity> = None;

            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(frame) => {
                            if !handle_frame(&state, connection_id, &mut identity, frame).await {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid frame from {}: {}", connection_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.signaling.remove_peer(&connection_id);
    let _ = state
        .room
        .send(RoomCommand::Disconnect { connection_id })
        .await;
    info!("WebSocket disconnected: {}", connection_id);
}

/// Routes one client frame. Returns `false` once the room actor is gone.
async fn handle_frame(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &mut Option<Identity>,
    frame: ClientMessage,
) -> bool {
    let cmd = match frame {
        ClientMessage::Join { identity: joined } => {
            debug!("{} joins as {}", connection_id, joined.username);
            *identity = Some(joined.clone());
            RoomCommand::Join {
                connection_id,
                identity: joined,
            }
        }
        ClientMessage::RequestStreamerSlot => RoomCommand::RequestSlot { connection_id },
        ClientMessage::LeaveSlot => RoomCommand::ReleaseSlot { connection_id },
        ClientMessage::Offer {
            target_id,
            descriptor,
        } => {
            return relay(state, connection_id, identity, target_id, RelaySignal::Offer(descriptor))
                .await;
        }
        ClientMessage::Answer {
            target_id,
            descriptor,
        } => {
            return relay(state, connection_id, identity, target_id, RelaySignal::Answer(descriptor))
                .await;
        }
        ClientMessage::IceCandidate {
            target_id,
            candidate,
        } => {
            return relay(
                state,
                connection_id,
                identity,
                target_id,
                RelaySignal::IceCandidate(candidate),
            )
            .await;
        }
    };

    if let Err(e) = state.room.send(cmd).await {
        error!("Room died: {}", e);
        return false;
    }
    true
}

async fn relay(
    state: &AppState,
    from: ConnectionId,
    identity: &Option<Identity>,
    target: ConnectionId,
    signal: RelaySignal,
) -> bool {
    relay_signal(
        &state.signaling,
        from,
        identity.as_ref().map(|i| i.username.as_str()),
        target,
        signal,
    )
    .await;
    true
}
