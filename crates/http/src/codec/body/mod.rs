//! Body framing codecs.
//!
//! - [`LengthReader`]: bounds a body to its `Content-Length`
//! - [`ChunkedReader`]: decodes `Transfer-Encoding: chunked` framing
//! - [`ChunkedEncoder`]: frames outgoing data of unknown length

mod chunked_encoder;
mod chunked_reader;
mod length_reader;

pub use chunked_encoder::ChunkedEncoder;
pub use chunked_reader::ChunkedReader;
pub use length_reader::LengthReader;
