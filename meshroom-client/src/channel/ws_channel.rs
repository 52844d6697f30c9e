use crate::channel::ChannelEvent;
use crate::config::ClientConfig;
use crate::error::ChannelError;
use crate::platform::SignalSink;
use futures::{Sink, SinkExt, StreamExt};
use meshroom_core::{ClientMessage, Identity, ServerMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Cloneable outbound half of a [`WsChannel`].
#[derive(Clone)]
pub struct WsSender {
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
}

impl SignalSink for WsSender {
    fn send(&self, message: ClientMessage) -> Result<(), ChannelError> {
        self.outbound_tx
            .send(message)
            .map_err(|_| ChannelError::Closed)
    }
}

/// Auto-reconnecting signaling socket.
///
/// Every (re)connect sends `join` before anything else. Frames queued while a dropped socket
/// was down belong to the previous connection and are discarded on reconnect.
pub struct WsChannel {
    sender: WsSender,
    task: JoinHandle<()>,
}

impl WsChannel {
    /// Starts the connection task. The inbound receiver exists before the first frame can arrive.
    pub fn connect(
        config: &ClientConfig,
        identity: Identity,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_connection(
            config.server_url.clone(),
            identity,
            config.reconnect_attempts,
            config.reconnect_delay,
            outbound_rx,
            inbound_tx,
        ));

        let channel = Self {
            sender: WsSender { outbound_tx },
            task,
        };
        (channel, inbound_rx)
    }

    pub fn sender(&self) -> WsSender {
        self.sender.clone()
    }

    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_connection(
    url: String,
    identity: Identity,
    max_attempts: u32,
    delay: Duration,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    inbound_tx: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut failures = 0;
    let mut reconnecting = false;

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                failures = 0;
                info!("Connected to {}", url);

                if reconnecting {
                    let stale = discard_queued(&mut outbound_rx);
                    if stale > 0 {
                        debug!("Discarded {} frame(s) queued while offline", stale);
                    }
                }
                reconnecting = true;

                let (mut writer, mut reader) = stream.split();

                let join = ClientMessage::Join {
                    identity: identity.clone(),
                };
                if let Err(e) = write_frame(&mut writer, &join).await {
                    warn!("Failed to send join: {}", e);
                } else {
                    let _ = inbound_tx.send(ChannelEvent::Connected);

                    loop {
                        tokio::select! {
                            out = outbound_rx.recv() => {
                                let Some(frame) = out else {
                                    info!("Channel sender dropped. Closing socket.");
                                    let _ = writer.close().await;
                                    return;
                                };
                                if let Err(e) = write_frame(&mut writer, &frame).await {
                                    warn!("Socket write failed: {}", e);
                                    break;
                                }
                            }

                            msg = reader.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        match serde_json::from_str::<ServerMessage>(&text) {
                                            Ok(frame) => {
                                                if inbound_tx.send(ChannelEvent::Message(frame)).is_err() {
                                                    return;
                                                }
                                            }
                                            Err(e) => warn!("Invalid server frame: {}", e),
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) | None => break,
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        warn!("Socket read failed: {}", e);
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }

                warn!("Disconnected from {}", url);
                if inbound_tx.send(ChannelEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", url, e);
            }
        }

        failures += 1;
        if failures > max_attempts {
            error!("Giving up on {} after {} attempts", url, max_attempts);
            let _ = inbound_tx.send(ChannelEvent::Closed);
            return;
        }

        debug!("Reconnecting in {:?} ({}/{})", delay, failures, max_attempts);
        tokio::time::sleep(delay).await;
    }
}

async fn write_frame<S>(writer: &mut S, frame: &ClientMessage) -> Result<(), ChannelError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json =
        serde_json::to_string(frame).map_err(|e| ChannelError::WebSocket(e.to_string()))?;
    writer
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ChannelError::WebSocket(e.to_string()))
}

fn discard_queued(outbound_rx: &mut mpsc::UnboundedReceiver<ClientMessage>) -> usize {
    let mut count = 0;
    while outbound_rx.try_recv().is_ok() {
        count += 1;
    }
    count
}
