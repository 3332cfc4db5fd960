//! Message-level HTTP types.
//!
//! - [`RequestHead`]: the parsed request line and header block, plus query and cookie access
//! - [`ResponseHead`]: status and fields of a response before its body, plus status line parsing
//! - [`PayloadSize`] / [`PayloadItem`]: body framing and streamed body pieces
//! - [`ByteRange`]: a single `Range: bytes=` request resolved against a content length
//! - [`body`]: the request body stream handed to handlers
//! - [`HttpError`], [`ParseError`], [`SendError`]: the error taxonomy of the read and write paths

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHead;
pub use request::parse_request_line;

mod response;
pub use response::ResponseHead;
pub use response::parse_status_line;
pub use response::status_response;

mod range;
pub use range::ByteRange;
pub use range::is_bytes_range;
pub use range::parse_range;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
