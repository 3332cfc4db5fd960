//! The listener side: settings, shared state and the accept loop.

mod config;
mod date;
mod state;

pub use config::ServerConfig;
pub use date::DateService;
pub use state::ServerState;

use crate::connection::HttpConnection;
use crate::handler::Handler;
use crate::websocket::SessionStore;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    handler: Option<Arc<dyn Handler>>,
    config: ServerConfig,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("address", &self.address).field("config", &self.config).finish_non_exhaustive()
    }
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, handler: None, config: ServerConfig::default() }
    }

    /// Resolution errors surface from [`build`](ServerBuilder::build).
    #[must_use]
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    #[must_use]
    pub fn handler<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn server_name<S: Into<String>>(mut self, server_name: S) -> Self {
        self.config.server_name = server_name.into();
        self
    }

    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    #[must_use]
    pub fn pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.config.pool_capacity = pool_capacity;
        self
    }

    #[must_use]
    pub fn keep_alive_max(mut self, keep_alive_max: u32) -> Self {
        self.config.keep_alive_max = keep_alive_max;
        self
    }

    #[must_use]
    pub fn keep_alive_timeout(mut self, keep_alive_timeout: Duration) -> Self {
        self.config.keep_alive_timeout = keep_alive_timeout;
        self
    }

    #[must_use]
    pub fn allow_gzip(mut self, allow_gzip: bool) -> Self {
        self.config.allow_gzip = allow_gzip;
        self
    }

    #[must_use]
    pub fn websocket_keep_alive(mut self, interval: Duration) -> Self {
        self.config.websocket_keep_alive = interval;
        self
    }

    #[must_use]
    pub fn max_message_size(mut self, max_message_size: u64) -> Self {
        self.config.max_message_size = max_message_size;
        self
    }

    #[must_use]
    pub fn log_level(mut self, log_level: Level) -> Self {
        self.config.log_level = log_level;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        if self.config.buffer_size == 0 {
            return Err(ServerBuildError::ZeroBufferSize);
        }
        if self.config.keep_alive_timeout.is_zero() || self.config.websocket_keep_alive.is_zero() {
            return Err(ServerBuildError::ZeroKeepAlive);
        }

        let config = ServerConfig { address, ..self.config };
        Ok(Server { config: Arc::new(config), handler, sessions: SessionStore::new() })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
    #[error("handler must be set")]
    MissingHandler,
    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,
    #[error("keep-alive intervals must be greater than zero")]
    ZeroKeepAlive,
}

pub struct Server {
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
    sessions: Arc<SessionStore>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("config", &self.config).field("sessions", &self.sessions).finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The poll sessions of this server, for broadcasting from outside any request.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Installs the log subscriber, binds the configured address and serves forever.
    pub async fn start(self) -> io::Result<()> {
        let subscriber = FmtSubscriber::builder().with_max_level(self.config.log_level).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            debug!(cause = %e, "keep the existing tracing subscriber");
        }

        info!(address = ?self.config.address, "start listening");
        let listener = match TcpListener::bind(self.config.address.as_slice()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return Err(e);
            }
        };
        self.serve(listener).await
    }

    /// Accepts connections on `listener`, one task each.
    ///
    /// Only a failing `local_addr` ends the loop; accept errors are logged and skipped.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let local_addr = listener.local_addr()?;
        let state = ServerState::new(self.config, self.handler, self.sessions);
        info!(%local_addr, "accepting connections");

        loop {
            let (tcp_stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };
            if let Err(e) = tcp_stream.set_nodelay(true) {
                debug!(cause = %e, "set nodelay failed");
            }

            let state = Arc::clone(&state);
            tokio::spawn(async move {
                info!(%remote_addr, "accepted connection");
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer, state);
                if let Err(e) = connection.process().await {
                    error!(%remote_addr, cause = %e, "connection failed");
                }
            });
        }
    }
}
