mod connection_events;
mod media;
mod signal_sink;

pub use connection_events::*;
pub use media::*;
pub use signal_sink::*;
