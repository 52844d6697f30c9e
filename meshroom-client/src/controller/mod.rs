mod client_command;
mod client_status;
mod room_client;
mod room_client_handle;

pub use client_command::*;
pub use client_status::*;
pub use room_client::*;
pub use room_client_handle::*;
