use meshroom_core::ServerMessage;

/// What the signaling channel reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The socket is (re)connected and the join frame has been sent.
    Connected,
    Message(ServerMessage),
    /// The socket dropped; a reconnect attempt follows.
    Disconnected,
    /// Reconnect attempts are exhausted.
    Closed,
}
