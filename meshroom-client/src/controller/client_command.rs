/// User intents accepted by the room client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    RequestJoin,
    Leave,
    ToggleAudio,
    ToggleVideo,
}
