//! Request body streaming.
//!
//! A [`RequestBody`] borrows the connection's input buffer for the duration of one request
//! and serves exactly the bytes of that request's body, whatever its framing:
//!
//! - `Content-Length` bodies through a [`LengthReader`](crate::codec::body::LengthReader)
//! - `Transfer-Encoding: chunked` bodies through a [`ChunkedReader`](crate::codec::body::ChunkedReader)
//! - no body at all
//!
//! Whatever the handler leaves unread is drained by the connection before the response goes
//! out, which keeps the stream aligned on the next request line.

mod request_body;

pub use request_body::BodyReader;
pub use request_body::RequestBody;
