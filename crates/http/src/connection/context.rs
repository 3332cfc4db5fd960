use super::negotiate::{KeepAlive, PendingResponse, send_response};
use crate::buffer::{DynWrite, OutputBuffer};
use crate::codec::header::HeaderEncoder;
use crate::codec::websocket::handshake_response;
use crate::content::{BytesContent, Content};
use crate::ensure;
use crate::protocol::body::RequestBody;
use crate::protocol::{HttpError, ParseError, PayloadSize, RequestHead, SendError};
use crate::server::{ServerConfig, ServerState};
use crate::websocket::{PollSession, SessionStore, WebSocket};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How the connection goes on after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    KeepAlive,
    Close,
    Upgraded,
}

/// One request and the response being built for it.
///
/// Handlers read the request head and body, then either describe the response (status,
/// headers and content, sent by the connection once they return) or take the connection
/// over with [`accept_websocket`](HttpContext::accept_websocket).
pub struct HttpContext<'c> {
    request: RequestHead,
    body: RequestBody<'c>,
    output: &'c mut OutputBuffer<DynWrite>,
    state: &'c ServerState,
    response: PendingResponse,
    sent: bool,
    upgraded: bool,
}

impl std::fmt::Debug for HttpContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContext")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("sent", &self.sent)
            .field("upgraded", &self.upgraded)
            .finish_non_exhaustive()
    }
}

impl<'c> HttpContext<'c> {
    pub(crate) fn new(
        request: RequestHead,
        body: RequestBody<'c>,
        output: &'c mut OutputBuffer<DynWrite>,
        state: &'c ServerState,
    ) -> Self {
        Self { request, body, output, state, response: PendingResponse::default(), sent: false, upgraded: false }
    }

    pub fn request(&self) -> &RequestHead {
        &self.request
    }

    pub fn body(&mut self) -> &mut RequestBody<'c> {
        &mut self.body
    }

    pub fn config(&self) -> &ServerConfig {
        self.state.config()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.state.sessions()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = Some(status);
    }

    /// Fields of the response. Defaults are only added for names left unset here.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response.headers
    }

    pub fn set_content<C: Content + 'static>(&mut self, content: C) {
        self.response.content = Some(Box::new(content));
    }

    /// Forces gzip on or off, whatever the content type.
    pub fn set_gzip(&mut self, gzip: bool) {
        self.response.gzip = Some(gzip);
    }

    /// True once a status or content was set, or the response already went out.
    pub fn is_handled(&self) -> bool {
        self.sent || self.response.status.is_some() || self.response.content.is_some()
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Answers the upgrade handshake and switches the connection to WebSocket framing.
    ///
    /// The connection never returns to HTTP afterwards: once the handler is done with the
    /// socket, the connection is shut down.
    pub async fn accept_websocket(&mut self) -> Result<WebSocket<'_>, HttpError> {
        ensure!(!self.sent, SendError::protocol_violation("response already sent"));
        let head = handshake_response(&self.request)?;
        self.body.drain().await?;

        self.output.encode(&mut HeaderEncoder, (head, PayloadSize::Empty)).await?;
        self.output.flush().await.map_err(SendError::io)?;
        self.sent = true;
        self.upgraded = true;
        info!(path = %self.request.path(), "websocket connection upgraded");

        let config = self.state.config();
        let (keep_alive, max_message_size) = (config.websocket_keep_alive, config.max_message_size);
        Ok(WebSocket::new(self.body.input_mut(), &mut *self.output, keep_alive, max_message_size))
    }

    /// Opens a long polling session for a `?socket=poll&command=open` request.
    ///
    /// The opening answer is sent right away with `connection: close`; the client continues
    /// on new requests, which the connection routes to the returned session.
    pub async fn accept_poll_session(&mut self, keep_alive: Duration) -> Result<Arc<PollSession>, HttpError> {
        ensure!(!self.sent, SendError::protocol_violation("response already sent"));
        ensure!(self.request.is_poll_open(), ParseError::protocol_violation("not a poll session request"));
        self.body.drain().await?;

        let session = self.state.sessions().open(keep_alive);
        let content = BytesContent::json(&session.open_response()).map_err(SendError::invalid_body)?;
        let response = PendingResponse {
            status: Some(StatusCode::OK),
            headers: std::mem::take(&mut self.response.headers),
            content: Some(Box::new(content)),
            gzip: Some(false),
        };
        send_response(self.output, self.state, &self.request, response, None).await?;
        self.sent = true;
        info!(id = %session.id(), "poll session opened");
        Ok(session)
    }

    /// Answers a request addressed to a live poll session.
    pub(crate) fn serve_poll(&mut self, session: &PollSession) {
        let answer = session.process(&self.request).and_then(|value| {
            BytesContent::json(&value).map_err(|e| ParseError::protocol_violation(e.to_string()))
        });
        match answer {
            Ok(content) => {
                self.response.status = Some(StatusCode::OK);
                self.response.gzip = Some(false);
                self.response.content = Some(Box::new(content));
            }
            Err(e) => {
                debug!(id = %session.id(), cause = %e, "rejected poll request");
                self.response.status = Some(StatusCode::BAD_REQUEST);
            }
        }
    }

    /// Replaces whatever the handler set with an empty 500.
    pub(crate) fn fail(&mut self) {
        if !self.sent {
            self.response = PendingResponse { status: Some(StatusCode::INTERNAL_SERVER_ERROR), ..Default::default() };
        }
    }

    pub(crate) async fn finish(mut self, keep_alive: Option<KeepAlive>) -> Result<Outcome, HttpError> {
        if self.upgraded {
            return Ok(Outcome::Upgraded);
        }
        if self.sent {
            return Ok(Outcome::Close);
        }

        self.body.drain().await?;
        self.response.settle(self.request.method());
        send_response(self.output, self.state, &self.request, self.response, keep_alive).await?;
        Ok(if keep_alive.is_some() { Outcome::KeepAlive } else { Outcome::Close })
    }
}

/// The interim answer to `expect: 100-continue`.
pub(crate) const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";
