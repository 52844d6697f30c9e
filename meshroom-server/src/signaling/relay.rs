use crate::signaling::SignalingOutput;
use meshroom_core::{ConnectionId, IceCandidate, ServerMessage, SessionDescription};
use tracing::debug;

/// A negotiation payload addressed to another connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RelaySignal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl RelaySignal {
    /// Wraps the payload in the server frame the target receives.
    pub fn into_message(self, from: ConnectionId, from_username: Option<String>) -> ServerMessage {
        match self {
            RelaySignal::Offer(descriptor) => ServerMessage::Offer {
                from,
                from_username,
                descriptor,
            },
            RelaySignal::Answer(descriptor) => ServerMessage::Answer {
                from,
                from_username,
                descriptor,
            },
            RelaySignal::IceCandidate(candidate) => ServerMessage::IceCandidate {
                from,
                from_username,
                candidate,
            },
        }
    }
}

/// Forwards `signal` to `target`, tagged with the sender. Unknown targets are dropped.
pub async fn relay_signal(
    output: &dyn SignalingOutput,
    from: ConnectionId,
    from_username: Option<&str>,
    target: ConnectionId,
    signal: RelaySignal,
) -> bool {
    let message = signal.into_message(from, from_username.map(str::to_owned));
    let kind = message.kind();

    let delivered = output.send(&target, message).await;
    if delivered {
        debug!("Relayed {} {} -> {}", kind, from, target);
    } else {
        debug!("Dropped {} from {}: target {} not connected", kind, from, target);
    }
    delivered
}
