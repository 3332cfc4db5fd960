//! Per-connection request processing.
//!
//! An [`HttpConnection`] reads requests off one transport in order, hands each one to the
//! handler as an [`HttpContext`], and writes the negotiated response before reading the next.
//! Its bookkeeping lives in a pooled [`ConnectionSession`].

mod context;
mod http_connection;
mod negotiate;
mod session;

pub use context::HttpContext;
pub use http_connection::HttpConnection;
pub use session::ConnectionSession;
