//! The shared buffer channel every codec reads through.
//!
//! A connection owns exactly one [`InputBuffer`]: a fixed-size byte array that is refilled
//! from the socket only once every previously read byte has been consumed. Higher level
//! readers (lines, bodies, multipart parts, websocket frames) borrow zero-copy views of
//! that array through the [`SharedRead`] contract, and push back bytes they over-read with
//! [`SharedRead::rewind`] so the next reader sees them.
//!
//! # Components
//!
//! - [`InputBuffer`]: the fixed read buffer bound to a reader half
//! - [`OutputBuffer`]: the write side, batching response bytes before they hit the socket
//! - [`Pool`] / [`Pooled`]: an arena of reusable slots with an explicit free-list
//!
//! # Rewind contract
//!
//! `rewind(n)` is only valid for `n` no larger than the last segment returned by
//! `shared_read`. Every reader in this crate upholds that, which is what lets a stack of
//! readers (boundary over chunked over buffer) push bytes back through all layers.

use crate::protocol::ParseError;
use bytes::BytesMut;

mod input;
mod output;
mod pool;

pub use input::DynRead;
pub use input::InputBuffer;
pub use output::DynWrite;
pub use output::OutputBuffer;
pub use pool::Pool;
pub use pool::Pooled;
pub use pool::Recycle;

/// Default capacity of a connection's read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Uniform read contract over every byte source: the raw buffer, request bodies and
/// multipart parts.
#[trait_variant::make(SharedRead: Send)]
pub trait LocalSharedRead {
    /// Returns a zero-copy view of at most `max` bytes, or an empty slice at end of stream.
    ///
    /// `max` must be greater than zero.
    async fn shared_read(&mut self, max: usize) -> Result<&[u8], ParseError>;

    /// Pushes the last `n` returned bytes back so they are served again.
    fn rewind(&mut self, n: usize);
}

/// Copies the next segment of `src` into `dst`, returning the number of bytes copied.
///
/// Zero means end of stream, unless `dst` is empty.
pub async fn read_into<S>(src: &mut S, dst: &mut [u8]) -> Result<usize, ParseError>
where
    S: SharedRead + ?Sized,
{
    if dst.is_empty() {
        return Ok(0);
    }
    let segment = SharedRead::shared_read(src, dst.len()).await?;
    let n = segment.len();
    dst[..n].copy_from_slice(segment);
    Ok(n)
}

/// Appends everything left in `src` to `dst`.
pub async fn read_to_end<S>(src: &mut S, dst: &mut BytesMut) -> Result<usize, ParseError>
where
    S: SharedRead + ?Sized,
{
    let mut total = 0;
    loop {
        let segment = SharedRead::shared_read(src, usize::MAX).await?;
        if segment.is_empty() {
            return Ok(total);
        }
        total += segment.len();
        dst.extend_from_slice(segment);
    }
}

/// Reads and discards everything left in `src`.
pub async fn drain<S>(src: &mut S) -> Result<u64, ParseError>
where
    S: SharedRead + ?Sized,
{
    let mut total = 0u64;
    loop {
        let len = SharedRead::shared_read(src, usize::MAX).await?.len();
        if len == 0 {
            return Ok(total);
        }
        total += len as u64;
    }
}
