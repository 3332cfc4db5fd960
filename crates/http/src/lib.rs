//! A streaming HTTP/1.1 and WebSocket protocol engine
//!
//! This crate reads requests straight out of one fixed, pooled buffer per connection and
//! writes responses through a small batching output buffer. Request bodies, multipart parts
//! and WebSocket frames are all decoded incrementally from that buffer, so nothing is
//! collected in memory unless a handler asks for it.
//!
//! # Features
//!
//! - HTTP/1.1 with keep-alive and `expect: 100-continue`
//! - `Content-Length` and chunked request bodies, streamed
//! - Streaming `multipart/form-data` parts
//! - Response negotiation: default fields, gzip, single byte ranges, `HEAD`
//! - RFC 6455 WebSockets with keep-alive pings
//! - Long polling sessions emulating a socket for clients that can not upgrade
//! - A client reading responses with the same body framing, redirects optional
//!
//! # Example
//!
//! ```no_run
//! use micro_wire::content::BytesContent;
//! use micro_wire::handler::{HandlerError, make_handler};
//! use micro_wire::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = make_handler(|ctx| {
//!         Box::pin(async move {
//!             if ctx.request().path() == "/hello" {
//!                 let body = ctx.body().read_to_string().await?;
//!                 ctx.set_content(BytesContent::text(format!("Hello World! {body}\r\n")));
//!             }
//!             Ok::<_, HandlerError>(())
//!         })
//!     });
//!
//!     let server = Server::builder().address("127.0.0.1:8080").handler(handler).build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`buffer`]: the shared input buffer, the output buffer and the resource pools
//! - [`codec`]: incremental decoders and encoders for lines, headers, bodies, multipart and
//!   WebSocket frames
//! - [`protocol`]: request and response heads, body framing, ranges and the error types
//! - [`content`]: response bodies and the sink they are written to
//! - [`connection`]: the per-connection request loop and response negotiation
//! - [`websocket`]: upgraded sockets and poll sessions
//! - [`handler`]: the trait applications implement
//! - [`server`]: configuration and the accept loop
//! - [`client`]: a keep-alive client and one-shot [`fetch`](client::fetch) over the same codecs
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: top level error of a connection
//! - [`protocol::ParseError`]: anything wrong with what the peer sent
//! - [`protocol::SendError`]: failures while writing a response
//!
//! A parse error only ever ends its own connection. A handler error becomes a `500` when
//! nothing was sent yet.
//!
//! # Limitations
//!
//! - HTTP/1.1 only, no TLS
//! - Maximum line size: 8KB
//! - Maximum number of headers: 100
//! - No request trailers or chunk extensions, no WebSocket extensions

pub mod buffer;
pub mod client;
pub mod codec;
pub mod connection;
pub mod content;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod websocket;

mod utils;
pub(crate) use utils::ensure;

#[cfg(test)]
mod test_util;
