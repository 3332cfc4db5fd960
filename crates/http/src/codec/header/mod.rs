//! Header block parsing and serialization.
//!
//! - [`read_headers`]: incremental MIME header block reader over any shared byte source
//! - [`decode_encoded_words`]: RFC 2047 `Q` word decoding applied to every value
//! - [`HeaderEncoder`]: response status line and field serialization
//! - [`RequestEncoder`]: request line and field serialization for the client

mod encoded_word;
mod header_encoder;
mod header_reader;
mod request_encoder;

pub use encoded_word::decode_encoded_words;
pub use header_encoder::HeaderEncoder;
pub use header_reader::{MAX_HEADER_NUM, insert_field, read_headers};
pub use request_encoder::RequestEncoder;
