mod rtc_capture;
mod rtc_connection;
mod rtc_platform;
mod rtc_track;

pub use rtc_capture::*;
pub use rtc_connection::*;
pub use rtc_platform::*;
pub use rtc_track::*;
