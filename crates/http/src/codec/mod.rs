//! Incremental codecs over the shared input buffer.
//!
//! Every reader here resumes correctly when its token (a line, a chunk size, a boundary
//! delimiter, a frame header) is split across reads, and hands back over-read bytes with
//! [`SharedRead::rewind`](crate::buffer::SharedRead::rewind).
//!
//! - [`line`]: CRLF line scanner
//! - [`header`]: header block reader and response head encoder
//! - [`body`]: length limited and chunked body framing
//! - [`multipart`]: `multipart/form-data` parts
//! - [`websocket`]: WebSocket frames and handshake

pub mod body;
pub mod header;
pub mod line;
pub mod multipart;
pub mod websocket;
