use crate::buffer::{DynRead, DynWrite, InputBuffer, OutputBuffer};
use crate::codec::websocket::{CloseStatus, Frame, FrameDecoder, FrameEncoder, Opcode};
use crate::ensure;
use crate::protocol::{HttpError, ParseError, SendError};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, trace, warn};

/// Payload length of the keep-alive pings.
const PING_PAYLOAD_LEN: usize = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WebSocketState {
    Open,
    CloseSent,
    CloseReceived,
    Closed,
}

/// A complete message received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
    /// The peer started the closing handshake; answer with [`WebSocket::close`].
    Close(CloseStatus, String),
}

/// The server side of an upgraded connection.
///
/// Frames are decoded straight from the connection's input buffer. While waiting for data,
/// the socket races the read against one keep-alive interval: an idle peer is pinged, a peer
/// silent for two intervals is dropped, and a frame stalling mid-way is dropped at once.
pub struct WebSocket<'c> {
    input: &'c mut InputBuffer<DynRead>,
    output: &'c mut OutputBuffer<DynWrite>,
    decoder: FrameDecoder,
    encoder: FrameEncoder,
    state: WebSocketState,
    keep_alive: Duration,
    last_seen: Instant,
    max_message_size: u64,
    partial: Option<(Opcode, BytesMut)>,
}

impl std::fmt::Debug for WebSocket<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket")
            .field("state", &self.state)
            .field("keep_alive", &self.keep_alive)
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

impl<'c> WebSocket<'c> {
    pub fn new(
        input: &'c mut InputBuffer<DynRead>,
        output: &'c mut OutputBuffer<DynWrite>,
        keep_alive: Duration,
        max_message_size: u64,
    ) -> Self {
        Self {
            input,
            output,
            decoder: FrameDecoder::with_max_payload(max_message_size),
            encoder: FrameEncoder::new(),
            state: WebSocketState::Open,
            keep_alive,
            last_seen: Instant::now(),
            max_message_size,
            partial: None,
        }
    }

    pub fn state(&self) -> WebSocketState {
        self.state
    }

    /// Waits for the next message; `None` once the connection is closed.
    ///
    /// Pings are answered and pongs swallowed without returning.
    pub async fn receive(&mut self) -> Result<Option<Message>, HttpError> {
        loop {
            if self.state == WebSocketState::Closed {
                return Ok(None);
            }

            if self.input.remaining() > 0 {
                let (used, frame) = self.decoder.decode_slice(self.input.available())?;
                self.input.consume(used);
                if let Some(frame) = frame {
                    if let Some(message) = self.on_frame(frame).await? {
                        return Ok(Some(message));
                    }
                }
                continue;
            }

            tokio::select! {
                filled = self.input.fill() => {
                    if filled.map_err(ParseError::io)? == 0 {
                        info!("websocket peer closed the connection");
                        self.state = WebSocketState::Closed;
                        return Ok(None);
                    }
                    self.last_seen = Instant::now();
                }
                () = sleep(self.keep_alive) => {
                    if self.decoder.in_progress() {
                        warn!("websocket frame stalled for a keep-alive interval, closing");
                        self.abort().await;
                        return Ok(None);
                    }
                    if self.last_seen.elapsed() >= self.keep_alive * 2 {
                        info!(idle = ?self.last_seen.elapsed(), "websocket peer went silent, closing");
                        self.abort().await;
                        return Ok(None);
                    }
                    let payload: [u8; PING_PAYLOAD_LEN] = rand::random();
                    self.send_frame(Frame::ping(payload.to_vec())).await?;
                    trace!("sent keep-alive ping");
                }
            }
        }
    }

    pub async fn send_text<S: Into<String>>(&mut self, text: S) -> Result<(), SendError> {
        self.send_message(Frame::text(text)).await
    }

    pub async fn send_binary<B: Into<Bytes>>(&mut self, data: B) -> Result<(), SendError> {
        self.send_message(Frame::binary(data)).await
    }

    /// Sends a close frame. From `Open` this starts the closing handshake, from
    /// `CloseReceived` it completes it.
    pub async fn close(&mut self, status: CloseStatus, reason: &str) -> Result<(), SendError> {
        let next = match self.state {
            WebSocketState::Open => WebSocketState::CloseSent,
            WebSocketState::CloseReceived => WebSocketState::Closed,
            WebSocketState::CloseSent | WebSocketState::Closed => return Ok(()),
        };
        self.send_frame(Frame::close(status, reason)).await?;
        self.state = next;
        debug!(?status, state = ?next, "sent websocket close");
        Ok(())
    }

    async fn send_message(&mut self, frame: Frame) -> Result<(), SendError> {
        ensure!(
            matches!(self.state, WebSocketState::Open | WebSocketState::CloseReceived),
            SendError::protocol_violation(format!("can not send in state {:?}", self.state))
        );
        self.send_frame(frame).await
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), SendError> {
        self.output.encode(&mut self.encoder, frame).await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn abort(&mut self) {
        self.state = WebSocketState::Closed;
        if let Err(e) = self.output.shutdown().await {
            debug!(cause = %e, "websocket shutdown failed");
        }
    }

    async fn on_frame(&mut self, frame: Frame) -> Result<Option<Message>, HttpError> {
        match frame.opcode {
            Opcode::Ping => {
                self.send_frame(Frame::pong(frame.payload)).await?;
                Ok(None)
            }
            Opcode::Pong => Ok(None),
            Opcode::Close => {
                let (status, reason) = frame.close_reason();
                if self.state == WebSocketState::CloseSent {
                    self.state = WebSocketState::Closed;
                    debug!("websocket closing handshake completed");
                    return Ok(None);
                }
                self.state = WebSocketState::CloseReceived;
                Ok(Some(Message::Close(status, reason)))
            }
            Opcode::Text | Opcode::Binary => {
                ensure!(self.partial.is_none(), ParseError::malformed_frame("new message before the previous one ended"));
                if frame.fin {
                    return Ok(Some(into_message(frame.opcode, frame.payload)?));
                }
                self.partial = Some((frame.opcode, BytesMut::from(&frame.payload[..])));
                Ok(None)
            }
            Opcode::Continuation => {
                let Some((opcode, mut buf)) = self.partial.take() else {
                    return Err(ParseError::malformed_frame("continuation frame without a message").into());
                };
                ensure!(
                    (buf.len() + frame.payload.len()) as u64 <= self.max_message_size,
                    ParseError::malformed_frame(format!("message exceeds {} bytes", self.max_message_size))
                );
                buf.extend_from_slice(&frame.payload);
                if frame.fin {
                    return Ok(Some(into_message(opcode, buf.freeze())?));
                }
                self.partial = Some((opcode, buf));
                Ok(None)
            }
        }
    }
}

fn into_message(opcode: Opcode, payload: Bytes) -> Result<Message, ParseError> {
    if opcode == Opcode::Binary {
        return Ok(Message::Binary(payload));
    }
    match String::from_utf8(payload.to_vec()) {
        Ok(text) => Ok(Message::Text(text)),
        Err(e) => Err(ParseError::malformed_frame(format!("text message is not utf-8: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::websocket::DEFAULT_MAX_PAYLOAD;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex, split};
    use tokio_util::codec::{Decoder, Encoder};

    const INTERVAL: Duration = Duration::from_secs(10);

    type Io = (InputBuffer<ReadHalf<DuplexStream>>, OutputBuffer<WriteHalf<DuplexStream>>);

    fn server() -> (DuplexStream, Io) {
        let (client, server) = duplex(1024 * 1024);
        let (read, write) = split(server);
        (client, (InputBuffer::new(read), OutputBuffer::new(write)))
    }

    fn client_frame(frame: Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        FrameEncoder::masked([9, 8, 7, 6]).encode(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    async fn read_frame(client: &mut DuplexStream) -> Frame {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        loop {
            if let Some(frame) = decoder.decode(&mut buf).unwrap() {
                return frame;
            }
            let mut byte = [0u8; 1];
            client.read_exact(&mut byte).await.unwrap();
            buf.extend_from_slice(&byte);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_peer_is_pinged_once_then_dropped() {
        let (mut client, (mut input, mut output)) = server();
        let mut ws = WebSocket::new(&mut input, &mut output, INTERVAL, DEFAULT_MAX_PAYLOAD);
        let start = Instant::now();

        let (received, wire) = tokio::join!(ws.receive(), async {
            let mut wire = Vec::new();
            client.read_to_end(&mut wire).await.unwrap();
            wire
        });

        assert_eq!(received.unwrap(), None);
        assert_eq!(ws.state(), WebSocketState::Closed);
        assert_eq!(start.elapsed(), INTERVAL * 2);
        assert_eq!(wire.len(), 2 + PING_PAYLOAD_LEN);
        assert_eq!(&wire[..2], &[0x89, PING_PAYLOAD_LEN as u8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_frame_closes_without_ping() {
        let (mut client, (mut input, mut output)) = server();
        client.write_all(&client_frame(Frame::text("hello"))[..4]).await.unwrap();
        let mut ws = WebSocket::new(&mut input, &mut output, INTERVAL, DEFAULT_MAX_PAYLOAD);
        let start = Instant::now();

        let (received, wire) = tokio::join!(ws.receive(), async {
            let mut wire = Vec::new();
            client.read_to_end(&mut wire).await.unwrap();
            wire
        });
        assert_eq!(received.unwrap(), None);
        assert_eq!(start.elapsed(), INTERVAL);
        assert!(wire.is_empty());
    }

    #[tokio::test]
    async fn test_messages_and_control_frames() {
        let (mut client, (mut input, mut output)) = server();
        let mut script = Vec::new();
        script.extend(client_frame(Frame::ping(&b"abc"[..])));
        script.extend(client_frame(Frame::text("hello")));
        script.extend(client_frame(Frame::new(false, Opcode::Binary, Bytes::from_static(b"ab"))));
        script.extend(client_frame(Frame::pong(&b"ignored"[..])));
        script.extend(client_frame(Frame::new(true, Opcode::Continuation, Bytes::from_static(b"cd"))));
        script.extend(client_frame(Frame::close(CloseStatus::NormalClosure, "done")));
        client.write_all(&script).await.unwrap();

        let mut ws = WebSocket::new(&mut input, &mut output, INTERVAL, DEFAULT_MAX_PAYLOAD);
        assert_eq!(ws.receive().await.unwrap(), Some(Message::Text("hello".into())));
        assert_eq!(read_frame(&mut client).await, Frame::pong(&b"abc"[..]));

        assert_eq!(ws.receive().await.unwrap(), Some(Message::Binary(Bytes::from_static(b"abcd"))));
        assert_eq!(
            ws.receive().await.unwrap(),
            Some(Message::Close(CloseStatus::NormalClosure, "done".into()))
        );
        assert_eq!(ws.state(), WebSocketState::CloseReceived);

        ws.close(CloseStatus::NormalClosure, "bye").await.unwrap();
        assert_eq!(ws.state(), WebSocketState::Closed);
        assert_eq!(read_frame(&mut client).await, Frame::close(CloseStatus::NormalClosure, "bye"));
        assert_eq!(ws.receive().await.unwrap(), None);
        assert!(matches!(ws.send_text("late").await, Err(SendError::ProtocolViolation { .. })));
    }

    #[tokio::test]
    async fn test_server_initiated_close() {
        let (mut client, (mut input, mut output)) = server();
        let mut ws = WebSocket::new(&mut input, &mut output, INTERVAL, DEFAULT_MAX_PAYLOAD);
        ws.send_text("x".repeat(70_000)).await.unwrap();
        ws.close(CloseStatus::EndpointUnavailable, "").await.unwrap();
        assert_eq!(ws.state(), WebSocketState::CloseSent);

        let frame = read_frame(&mut client).await;
        assert_eq!(frame.payload.len(), 70_000);
        assert_eq!(read_frame(&mut client).await.close_reason().0, CloseStatus::EndpointUnavailable);

        client.write_all(&client_frame(Frame::close(CloseStatus::NormalClosure, ""))).await.unwrap();
        assert_eq!(ws.receive().await.unwrap(), None);
        assert_eq!(ws.state(), WebSocketState::Closed);
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let cases = [
            client_frame(Frame::new(true, Opcode::Continuation, Bytes::from_static(b"x"))),
            [client_frame(Frame::new(false, Opcode::Text, Bytes::new())), client_frame(Frame::text("x"))].concat(),
            client_frame(Frame::binary(vec![0u8; 33])),
            client_frame(Frame::new(true, Opcode::Text, Bytes::from_static(b"\xff\xfe"))),
        ];
        for script in cases {
            let (mut client, (mut input, mut output)) = server();
            client.write_all(&script).await.unwrap();
            let mut ws = WebSocket::new(&mut input, &mut output, INTERVAL, 32);
            let result = ws.receive().await;
            assert!(
                matches!(result, Err(HttpError::RequestError { source: ParseError::MalformedWebSocketFrame { .. } })),
                "{result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_peer_disconnect() {
        let (client, (mut input, mut output)) = server();
        drop(client);
        let mut ws = WebSocket::new(&mut input, &mut output, INTERVAL, DEFAULT_MAX_PAYLOAD);
        assert_eq!(ws.receive().await.unwrap(), None);
    }
}
