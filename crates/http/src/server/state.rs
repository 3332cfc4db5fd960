use super::{DateService, ServerConfig};
use crate::buffer::Pool;
use crate::connection::ConnectionSession;
use crate::handler::Handler;
use crate::websocket::SessionStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DATE_UPDATE_INTERVAL: Duration = Duration::from_millis(800);

/// Everything connections share: settings, the handler, the poll sessions, the date cache and
/// the resource pools.
pub struct ServerState {
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
    sessions: Arc<SessionStore>,
    date: DateService,
    buffers: Arc<Pool<Box<[u8]>>>,
    connections: Arc<Pool<ConnectionSession>>,
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("buffers", &self.buffers)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Must be called within a tokio runtime, which runs the date refresh task.
    pub fn new(config: Arc<ServerConfig>, handler: Arc<dyn Handler>, sessions: Arc<SessionStore>) -> Arc<Self> {
        let buffer_size = config.buffer_size;
        Arc::new(Self {
            buffers: Pool::new(config.pool_capacity, move || vec![0u8; buffer_size].into_boxed_slice()),
            connections: Pool::new(config.pool_capacity, ConnectionSession::default),
            date: DateService::start(DATE_UPDATE_INTERVAL),
            config,
            handler,
            sessions,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn date(&self) -> &DateService {
        &self.date
    }

    pub fn buffers(&self) -> &Arc<Pool<Box<[u8]>>> {
        &self.buffers
    }

    pub fn connections(&self) -> &Arc<Pool<ConnectionSession>> {
        &self.connections
    }
}
