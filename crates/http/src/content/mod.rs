//! Response content.
//!
//! A handler answers with a [`ResponseHead`](crate::protocol::ResponseHead) and an optional
//! boxed [`Content`]. The connection negotiates the transfer (plain, chunked, gzip, byte
//! range) from what the content reports and then asks it to copy itself into a
//! [`ResponseSink`].
//!
//! Each kind of content has its own constructor; nothing converts implicitly:
//!
//! - [`BytesContent`]: in-memory text, HTML, JSON or arbitrary bytes
//! - [`FileContent`]: a file on disk, range capable
//! - [`StreamContent`]: any async reader of unknown length, always sent chunked
//! - [`EmptyContent`]: a body of zero bytes

mod bytes_content;
mod file_content;
mod sink;
mod stream_content;

pub use bytes_content::BytesContent;
pub use bytes_content::EmptyContent;
pub use file_content::FileContent;
pub use file_content::content_type_for;
pub use sink::ResponseSink;
pub use sink::Transfer;
pub use stream_content::StreamContent;

use crate::protocol::SendError;
use async_trait::async_trait;

#[async_trait]
pub trait Content: Send {
    fn content_type(&self) -> Option<&str>;

    /// Exact body length when it is known up front.
    fn try_compute_length(&self) -> Option<u64>;

    /// Whether [`copy_range_to`](Content::copy_range_to) is implemented.
    fn supports_ranges(&self) -> bool {
        false
    }

    async fn copy_to(&mut self, sink: &mut ResponseSink<'_>) -> Result<(), SendError>;

    /// Copies `length` bytes starting at `start`.
    async fn copy_range_to(&mut self, sink: &mut ResponseSink<'_>, start: u64, length: u64) -> Result<(), SendError> {
        let _ = (sink, start, length);
        Err(SendError::invalid_body("content does not support byte ranges"))
    }
}
