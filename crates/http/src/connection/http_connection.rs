use super::context::{CONTINUE, HttpContext, Outcome};
use super::negotiate::{KeepAlive, send_bad_request};
use super::session::ConnectionSession;
use crate::buffer::{DynRead, DynWrite, InputBuffer, OutputBuffer, Pooled};
use crate::codec::line::LineScanner;
use crate::handler::Handler;
use crate::protocol::body::RequestBody;
use crate::protocol::{HttpError, ParseError, PayloadSize, RequestHead, SendError};
use crate::server::ServerState;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// An HTTP/1.1 connection serving requests in order until it closes.
///
/// `HttpConnection` owns both halves of the transport and runs the whole request/response
/// cycle on them:
/// - reading the request head into a pooled buffer
/// - answering `expect: 100-continue`
/// - dispatching to a poll session or to the server's handler
/// - draining whatever body the handler left unread
/// - negotiating and writing the response
///
/// The loop runs while the keep-alive budget lasts, and ends for good once a handler takes the
/// connection over as a WebSocket.
pub struct HttpConnection<R, W> {
    session: Pooled<ConnectionSession>,
    state: Arc<ServerState>,
    scanner: LineScanner,
    input: InputBuffer<R>,
    output: OutputBuffer<W>,
}

impl<R, W> std::fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("session", &self.session)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(reader: R, writer: W, state: Arc<ServerState>) -> Self {
        let mut session = state.connections().acquire();
        let config = state.config();
        session.start(config.keep_alive_max, config.keep_alive_timeout);
        let input = InputBuffer::with_buffer(state.buffers().acquire(), reader);
        Self { session, scanner: LineScanner::new(), input, output: OutputBuffer::new(writer), state }
    }

    /// Serves requests until the connection closes, then shuts the writer down.
    ///
    /// A peer going away is a normal end and yields `Ok`.
    pub async fn process(mut self) -> Result<(), HttpError> {
        let result = self.serve().await;

        self.session.read_counter = self.input.read_counter();
        self.session.write_counter = self.output.write_counter();
        if let Err(e) = self.output.shutdown().await {
            debug!(cause = %e, "shutdown connection failed");
        }
        info!(
            requests = self.session.request_counter,
            read = self.session.read_counter,
            written = self.session.write_counter,
            elapsed = ?self.session.start_time.elapsed(),
            "connection closed"
        );

        match result {
            Err(e) if e.is_disconnect() => {
                debug!(cause = %e, "peer disconnected");
                Ok(())
            }
            other => other,
        }
    }

    async fn serve(&mut self) -> Result<(), HttpError> {
        let input: &mut InputBuffer<DynRead> = &mut self.input;
        let output: &mut OutputBuffer<DynWrite> = &mut self.output;
        let state = &*self.state;

        while self.session.keep_alive_countdown >= 0 {
            let read = timeout(self.session.keep_alive_timeout, RequestHead::read(&mut *input, &mut self.scanner)).await;
            let request = match read {
                Err(_) => {
                    debug!(timeout = ?self.session.keep_alive_timeout, "no request within the keep-alive timeout");
                    return Ok(());
                }
                Ok(Ok(None)) => return Ok(()),
                Ok(Ok(Some(request))) => request,
                Ok(Err(e @ ParseError::Io { .. })) => return Err(e.into()),
                Ok(Err(e)) => {
                    warn!(cause = %e, "invalid request head");
                    send_bad_request(output).await?;
                    return Err(e.into());
                }
            };
            self.session.request_counter += 1;

            let size = match request.payload_size() {
                Ok(size) => size,
                Err(e) => {
                    warn!(cause = %e, "invalid request framing");
                    send_bad_request(output).await?;
                    return Err(e.into());
                }
            };

            if request.expects_continue() && size != PayloadSize::Empty {
                output.write(CONTINUE).await.map_err(SendError::io)?;
                output.flush().await.map_err(SendError::io)?;
                debug!("sent 100 continue");
            }

            let countdown = self.session.keep_alive_countdown;
            let keep_alive = (request.keep_alive_requested() && countdown > 0)
                .then_some(KeepAlive { timeout: self.session.keep_alive_timeout, max: countdown });

            let method = request.method().clone();
            let path = request.path().to_string();
            let poll = state.sessions().lookup(&request);
            let mut ctx = HttpContext::new(request, RequestBody::new(&mut *input, size), &mut *output, state);

            match poll {
                Some(session) => ctx.serve_poll(&session),
                None => {
                    if let Err(e) = state.handler().handle(&mut ctx).await {
                        error!(%method, %path, cause = %e, "handler failed");
                        if ctx.is_sent() {
                            return Ok(());
                        }
                        ctx.fail();
                    }
                }
            }

            let outcome = ctx.finish(keep_alive).await?;
            debug!(%method, %path, ?outcome, "request served");
            match outcome {
                Outcome::KeepAlive => self.session.keep_alive_countdown -= 1,
                Outcome::Close | Outcome::Upgraded => self.session.keep_alive_countdown = -1,
            }
        }
        Ok(())
    }
}
