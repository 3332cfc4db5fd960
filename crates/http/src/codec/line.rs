//! Incremental CRLF line scanner.
//!
//! A line may arrive split over any number of buffer fills, so the scanning state lives in a
//! caller-owned [`LineScanner`] instead of in the buffer. [`read_line`] drives a scanner over
//! any [`SharedRead`] source and rewinds the bytes following the line terminator.

use crate::buffer::SharedRead;
use crate::ensure;
use crate::protocol::ParseError;
use tracing::trace;

/// Maximum accepted length of a single line, terminator excluded.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Accumulates one line across segments.
#[derive(Debug, Clone)]
pub struct LineScanner {
    line: Vec<u8>,
    cr: bool,
    max_size: usize,
}

impl Default for LineScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl LineScanner {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(max_size: usize) -> Self {
        Self { line: Vec::with_capacity(128), cr: false, max_size }
    }

    /// True when no byte of a line has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.line.is_empty() && !self.cr
    }

    /// Scans `segment` for the end of the current line.
    ///
    /// Returns `Some(used)` once the CRLF terminator has been consumed, `used` counting the
    /// bytes of `segment` that belong to the line. `None` means every byte was consumed and the
    /// line continues in the next segment.
    pub fn scan(&mut self, segment: &[u8]) -> Result<Option<usize>, ParseError> {
        if segment.is_empty() {
            return Ok(None);
        }

        if self.cr {
            ensure!(segment[0] == LF, ParseError::malformed_line("expected LF after CR"));
            self.cr = false;
            return Ok(Some(1));
        }

        match segment.iter().position(|&b| b == CR || b == LF) {
            None => {
                self.push(segment)?;
                Ok(None)
            }
            Some(pos) => {
                self.push(&segment[..pos])?;
                ensure!(segment[pos] == CR, ParseError::malformed_line("LF without CR"));
                match segment.get(pos + 1) {
                    None => {
                        self.cr = true;
                        Ok(None)
                    }
                    Some(&LF) => Ok(Some(pos + 2)),
                    Some(_) => Err(ParseError::malformed_line("expected LF after CR")),
                }
            }
        }
    }

    /// Returns the completed line and resets the scanner for the next one.
    pub fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.reset();
        line
    }

    pub fn reset(&mut self) {
        self.line.clear();
        self.cr = false;
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        ensure!(self.line.len() + bytes.len() <= self.max_size, ParseError::line_too_long(self.max_size));
        self.line.extend_from_slice(bytes);
        Ok(())
    }
}

/// Reads one CRLF terminated line from `src`.
///
/// Returns `None` when the source ends cleanly before the first byte of a line. End of stream
/// in the middle of a line is [`ParseError::MalformedLine`].
pub async fn read_line<S>(src: &mut S, scanner: &mut LineScanner) -> Result<Option<String>, ParseError>
where
    S: SharedRead + ?Sized,
{
    loop {
        let segment = src.shared_read(usize::MAX).await?;
        if segment.is_empty() {
            if scanner.is_empty() {
                return Ok(None);
            }
            scanner.reset();
            return Err(ParseError::malformed_line("unexpected end of stream inside a line"));
        }

        let len = segment.len();
        if let Some(used) = scanner.scan(segment)? {
            src.rewind(len - used);
            let line = scanner.take_line();
            trace!(len = line.len(), "read line");
            return Ok(Some(line));
        }
    }
}
