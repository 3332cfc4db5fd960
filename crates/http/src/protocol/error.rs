use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    /// Whether the error only means the peer went away.
    pub fn is_disconnect(&self) -> bool {
        let source = match self {
            HttpError::RequestError { source: ParseError::Io { source } } => source,
            HttpError::ResponseError { source: SendError::Io { source } } => source,
            _ => return false,
        };
        matches!(
            source.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        )
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed line: {reason}")]
    MalformedLine { reason: String },

    #[error("line too long, exceed the limit {max_size}")]
    LineTooLong { max_size: usize },

    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("malformed chunk: {reason}")]
    MalformedChunk { reason: String },

    #[error("malformed boundary: {reason}")]
    MalformedBoundary { reason: String },

    #[error("malformed websocket frame: {reason}")]
    MalformedWebSocketFrame { reason: String },

    #[error("unsupported range: {reason}")]
    UnsupportedRange { reason: String },

    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed_line<S: ToString>(str: S) -> Self {
        Self::MalformedLine { reason: str.to_string() }
    }

    pub fn line_too_long(max_size: usize) -> Self {
        Self::LineTooLong { max_size }
    }

    pub fn malformed_header<S: ToString>(str: S) -> Self {
        Self::MalformedHeader { reason: str.to_string() }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn malformed_chunk<S: ToString>(str: S) -> Self {
        Self::MalformedChunk { reason: str.to_string() }
    }

    pub fn malformed_boundary<S: ToString>(str: S) -> Self {
        Self::MalformedBoundary { reason: str.to_string() }
    }

    pub fn malformed_frame<S: ToString>(str: S) -> Self {
        Self::MalformedWebSocketFrame { reason: str.to_string() }
    }

    pub fn unsupported_range<S: ToString>(str: S) -> Self {
        Self::UnsupportedRange { reason: str.to_string() }
    }

    pub fn protocol_violation<S: ToString>(str: S) -> Self {
        Self::ProtocolViolation { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub(crate) fn unexpected_eof() -> Self {
        Self::io(io::Error::from(io::ErrorKind::UnexpectedEof))
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn protocol_violation<S: ToString>(str: S) -> Self {
        Self::ProtocolViolation { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
