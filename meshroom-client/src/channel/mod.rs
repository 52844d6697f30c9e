mod channel_event;
mod ws_channel;

pub use channel_event::*;
pub use ws_channel::*;
