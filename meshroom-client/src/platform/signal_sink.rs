use crate::error::ChannelError;
use meshroom_core::ClientMessage;

/// Outbound half of the signaling channel.
pub trait SignalSink: Send + Sync {
    fn send(&self, message: ClientMessage) -> Result<(), ChannelError>;
}
