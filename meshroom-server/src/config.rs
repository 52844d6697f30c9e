use meshroom_core::IceServerConfig;
use meshroom_core::utils::{DEFAULT_CAPACITY, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use std::net::SocketAddr;

/// Server settings. ICE servers are pushed to every client on connect.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub capacity: usize,
    pub ice_servers: Vec<IceServerConfig>,
    /// Bound of the room actor mailbox.
    pub mailbox_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5050)),
            capacity: DEFAULT_CAPACITY,
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            mailbox_size: 100,
        }
    }
}
