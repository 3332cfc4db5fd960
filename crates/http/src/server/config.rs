use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// Immutable server settings, shared by every connection.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: Vec<SocketAddr>,
    /// Value of the default `server` header.
    pub server_name: String,
    /// Size of each connection's read buffer.
    pub buffer_size: usize,
    /// Read buffers and connection sessions kept for reuse.
    pub pool_capacity: usize,
    /// Requests served on one connection before it is closed.
    pub keep_alive_max: u32,
    /// How long an idle connection waits for its next request.
    pub keep_alive_timeout: Duration,
    pub allow_gzip: bool,
    pub websocket_keep_alive: Duration,
    pub max_message_size: u64,
    pub log_level: Level,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Vec::new(),
            server_name: "micro-wire".to_string(),
            buffer_size: crate::buffer::DEFAULT_BUFFER_SIZE,
            pool_capacity: 1024,
            keep_alive_max: 100,
            keep_alive_timeout: Duration::from_secs(10),
            allow_gzip: true,
            websocket_keep_alive: Duration::from_secs(10),
            max_message_size: crate::codec::websocket::DEFAULT_MAX_PAYLOAD,
            log_level: Level::INFO,
        }
    }
}
