//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Serves a script of reads: each `poll_read` returns at most one scripted chunk, so a
/// message can be delivered split at arbitrary positions.
pub(crate) struct ScriptedReader {
    chunks: VecDeque<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedReader {
    pub(crate) fn new<I: IntoIterator<Item = Vec<u8>>>(chunks: I) -> Self {
        Self { chunks: chunks.into_iter().collect(), reads: Arc::new(AtomicUsize::new(0)) }
    }

    /// Splits `data` into reads of `size` bytes.
    pub(crate) fn split(data: &[u8], size: usize) -> Self {
        Self::new(data.chunks(size).map(<[u8]>::to_vec))
    }

    /// Delivers `data` in one read.
    pub(crate) fn whole(data: &[u8]) -> Self {
        Self::new([data.to_vec()])
    }

    /// Counter of `poll_read` calls, shared with the reader.
    pub(crate) fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(mut chunk) = self.chunks.pop_front() {
            let amt = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..amt]);
            if amt < chunk.len() {
                let rest = chunk.split_off(amt);
                self.chunks.push_front(rest);
            }
        }
        Poll::Ready(Ok(()))
    }
}

/// The read granularities every incremental codec must be indifferent to.
pub(crate) const SPLITS: [usize; 4] = [1, 3, 7, usize::MAX];

/// Builds a reader delivering `data` in pieces of `size` bytes.
pub(crate) fn split_reader(data: &[u8], size: usize) -> ScriptedReader {
    if size == usize::MAX { ScriptedReader::whole(data) } else { ScriptedReader::split(data, size) }
}
