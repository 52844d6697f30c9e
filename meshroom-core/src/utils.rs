pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// Streamer slots in the shared room unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 4;
