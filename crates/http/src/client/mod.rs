//! A small HTTP/1.1 client built on the same codecs as the server.
//!
//! [`HttpClient`] keeps one connection open and sends requests on it one after the other. Each
//! [`ClientResponse`] borrows the client while its body is read; a body left unread is drained
//! before the next request goes out, which keeps the stream aligned on the next status line.
//!
//! [`fetch`] covers the one-shot case: a fresh connection per request, the whole body read into
//! memory and, when asked, redirects followed.

mod fetch;
mod http_client;
mod request;
mod response;

pub use fetch::fetch;
pub use http_client::HttpClient;
pub use request::ClientRequest;
pub use response::ClientResponse;

use crate::protocol::{ParseError, SendError};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("too many redirects ({count})")]
    TooManyRedirects { count: usize },

    #[error("request error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("response error: {source}")]
    Receive {
        #[from]
        source: ParseError,
    },
}

impl ClientError {
    pub fn invalid_url<U: ToString, S: ToString>(url: U, reason: S) -> Self {
        Self::InvalidUrl { url: url.to_string(), reason: reason.to_string() }
    }
}
