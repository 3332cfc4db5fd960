use crate::buffer::Recycle;
use std::time::Duration;
use tokio::time::Instant;

/// Per-connection bookkeeping, leased from the server's pool for the connection's lifetime.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    /// Requests that may still be served with keep-alive; `-1` once the connection is closing.
    pub keep_alive_countdown: i64,
    pub keep_alive_timeout: Duration,
    pub read_counter: u64,
    pub write_counter: u64,
    pub request_counter: u64,
    pub start_time: Instant,
}

impl Default for ConnectionSession {
    fn default() -> Self {
        Self {
            keep_alive_countdown: 0,
            keep_alive_timeout: Duration::ZERO,
            read_counter: 0,
            write_counter: 0,
            request_counter: 0,
            start_time: Instant::now(),
        }
    }
}

impl Recycle for ConnectionSession {
    fn recycle(&mut self) {
        *self = Self::default();
    }
}

impl ConnectionSession {
    pub fn start(&mut self, keep_alive_max: u32, keep_alive_timeout: Duration) {
        self.keep_alive_countdown = i64::from(keep_alive_max);
        self.keep_alive_timeout = keep_alive_timeout;
        self.start_time = Instant::now();
    }

    pub fn is_closing(&self) -> bool {
        self.keep_alive_countdown < 0
    }
}
