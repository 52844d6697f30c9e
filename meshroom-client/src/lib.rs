mod channel;
mod config;
mod controller;
mod error;
mod platform;
mod rtc;
mod session;

pub use channel::*;
pub use config::*;
pub use controller::*;
pub use error::*;
pub use platform::*;
pub use rtc::*;
pub use session::*;
