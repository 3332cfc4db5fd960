//! Delimiter scanning for one multipart part.
//!
//! A part ends at `CRLF--boundary` followed by either `CRLF` (another part follows) or
//! `--CRLF` (the terminal boundary). The pattern may be split across any number of reads, so
//! the bytes of a partial match are held back until the match either completes or fails; a
//! failed match re-emits them as content from the pattern itself.

use crate::buffer::SharedRead;
use crate::protocol::ParseError;
use tracing::trace;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const DASH: u8 = b'-';

/// Outcome of scanning one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// Every byte joined a partial match, more input is needed.
    More,
    /// The delimiter completed; `unused` trailing bytes belong to whoever reads next.
    End { unused: usize },
    /// `len` leading bytes are content. When `boundary` is set the delimiter follows them
    /// directly and spans that many bytes.
    Content { len: usize, boundary: Option<usize> },
    /// A match carried over from earlier segments failed: `len` held back pattern bytes are
    /// content again and `unused` trailing bytes were not looked at.
    Flush { len: usize, unused: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Test {
    Matched(usize),
    Partial,
    Failed(usize),
}

/// Scanner state of one part, kept across reads.
#[derive(Debug, Clone)]
pub struct BoundaryState {
    pattern: Vec<u8>,
    match_pos: usize,
    is_last: bool,
    flush: Option<(usize, usize)>,
    boundary_pending: Option<usize>,
    ended: bool,
}

impl BoundaryState {
    pub fn new(boundary: &str) -> Self {
        let mut pattern = Vec::with_capacity(boundary.len() + 4);
        pattern.extend_from_slice(b"\r\n--");
        pattern.extend_from_slice(boundary.as_bytes());
        Self { pattern, match_pos: 0, is_last: false, flush: None, boundary_pending: None, ended: false }
    }

    /// Whether the part was closed by the terminal `--boundary--` delimiter.
    pub fn is_last_boundary(&self) -> bool {
        self.is_last
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Advances the match over `data`.
    fn test(&mut self, data: &[u8]) -> Result<Test, ParseError> {
        let pattern_len = self.pattern.len();
        for (i, &b) in data.iter().enumerate() {
            if self.match_pos < pattern_len {
                if self.pattern[self.match_pos] != b {
                    return Ok(Test::Failed(i));
                }
            } else {
                match self.match_pos - pattern_len {
                    0 if b == DASH => self.is_last = true,
                    0 if b == CR => {}
                    1 if !self.is_last && b == LF => {
                        self.match_pos = 0;
                        return Ok(Test::Matched(i + 1));
                    }
                    1 if self.is_last && b == DASH => {}
                    2 if b == CR => {}
                    3 if b == LF => {
                        self.match_pos = 0;
                        return Ok(Test::Matched(i + 1));
                    }
                    _ => return Err(ParseError::malformed_boundary("invalid bytes after boundary delimiter")),
                }
            }
            self.match_pos += 1;
        }
        Ok(Test::Partial)
    }

    /// Scans one segment fetched from the underlying source.
    pub(crate) fn scan(&mut self, segment: &[u8]) -> Result<Scan, ParseError> {
        let len = segment.len();

        if self.match_pos > 0 {
            return match self.test(segment)? {
                Test::Matched(used) => Ok(Scan::End { unused: len - used }),
                Test::Partial => Ok(Scan::More),
                Test::Failed(used) => {
                    let held = self.match_pos;
                    self.match_pos = 0;
                    self.is_last = false;
                    Ok(Scan::Flush { len: held, unused: len - used })
                }
            };
        }

        let mut from = 0;
        while let Some(offset) = segment[from..].iter().position(|&b| b == CR) {
            let at = from + offset;
            match self.test(&segment[at..])? {
                Test::Matched(used) if at == 0 => return Ok(Scan::End { unused: len - used }),
                Test::Matched(used) => return Ok(Scan::Content { len: at, boundary: Some(used) }),
                Test::Partial if at == 0 => return Ok(Scan::More),
                Test::Partial => {
                    self.match_pos = 0;
                    self.is_last = false;
                    return Ok(Scan::Content { len: at, boundary: None });
                }
                Test::Failed(_) => {
                    self.match_pos = 0;
                    self.is_last = false;
                    from = at + 1;
                }
            }
        }
        Ok(Scan::Content { len, boundary: None })
    }
}

enum Step {
    Eof,
    Flush(usize, usize),
    Content(usize),
}

/// Body of one multipart part: the bytes of `src` up to the next delimiter.
pub struct BoundaryStream<'p, S: ?Sized> {
    src: &'p mut S,
    state: &'p mut BoundaryState,
}

impl<S: ?Sized> std::fmt::Debug for BoundaryStream<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryStream").field("state", &self.state).finish_non_exhaustive()
    }
}

impl<'p, S: SharedRead + ?Sized> BoundaryStream<'p, S> {
    pub fn new(src: &'p mut S, state: &'p mut BoundaryState) -> Self {
        Self { src, state }
    }

    pub fn is_last_boundary(&self) -> bool {
        self.state.is_last_boundary()
    }

    async fn next_step(&mut self, max: usize) -> Result<Step, ParseError> {
        loop {
            if self.state.ended {
                return Ok(Step::Eof);
            }
            if let Some((pos, len)) = self.state.flush {
                let n = len.min(max);
                self.state.flush = (n < len).then_some((pos + n, len - n));
                return Ok(Step::Flush(pos, n));
            }
            if let Some(used) = self.state.boundary_pending.take() {
                let consumed = self.src.shared_read(used).await?.len();
                if consumed != used {
                    return Err(ParseError::malformed_boundary("boundary delimiter went missing"));
                }
                self.state.ended = true;
                trace!(last = self.state.is_last, "reached multipart boundary");
                continue;
            }

            let (scan, len) = {
                let segment = self.src.shared_read(max).await?;
                if segment.is_empty() {
                    return Err(ParseError::malformed_boundary("unexpected end of stream before boundary"));
                }
                (self.state.scan(segment)?, segment.len())
            };

            match scan {
                Scan::More => {}
                Scan::End { unused } => {
                    self.src.rewind(unused);
                    self.state.ended = true;
                    trace!(last = self.state.is_last, "reached multipart boundary");
                }
                Scan::Content { len: content, boundary } => {
                    self.src.rewind(len);
                    self.state.boundary_pending = boundary;
                    return Ok(Step::Content(content));
                }
                Scan::Flush { len: held, unused } => {
                    self.src.rewind(unused);
                    self.state.flush = Some((0, held));
                }
            }
        }
    }
}

impl<S: SharedRead + ?Sized> SharedRead for BoundaryStream<'_, S> {
    async fn shared_read(&mut self, max: usize) -> Result<&[u8], ParseError> {
        if max == 0 {
            return Ok(&[]);
        }
        match self.next_step(max).await? {
            Step::Eof => Ok(&[]),
            Step::Flush(pos, n) => Ok(&self.state.pattern[pos..pos + n]),
            Step::Content(n) => self.src.shared_read(n).await,
        }
    }

    /// Only content served straight from the source can be pushed back.
    fn rewind(&mut self, n: usize) {
        self.src.rewind(n);
    }
}
