//! Single `Range: bytes=...` request support.

use crate::ensure;
use crate::protocol::ParseError;

/// A satisfiable byte range of a body of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    /// Inclusive index of the last byte.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.length - 1
    }

    /// `content-range` value for a body of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end(), total)
    }
}

/// True when the header asks for byte ranges at all.
pub fn is_bytes_range(value: &str) -> bool {
    value.get(..6).is_some_and(|prefix| prefix.eq_ignore_ascii_case("bytes="))
}

/// Parses a `Range` header against a body of `length` bytes.
///
/// Accepts `start-end`, `start-` and `-suffix`. Multiple ranges, empty ranges and anything
/// unparsable are [`ParseError::UnsupportedRange`]; callers fall back to the full body.
pub fn parse_range(value: &str, length: u64) -> Result<ByteRange, ParseError> {
    ensure!(is_bytes_range(value), ParseError::unsupported_range("only bytes ranges are supported"));

    let set = value[6..].trim();
    ensure!(!set.contains(','), ParseError::unsupported_range("multiple ranges are not supported"));

    let range = if let Some(suffix) = set.strip_prefix('-') {
        let last = parse_position(suffix)?;
        let len = length.min(last);
        ByteRange { start: length - len, length: len }
    } else if let Some(first) = set.strip_suffix('-') {
        let start = length.min(parse_position(first)?);
        ByteRange { start, length: length - start }
    } else {
        let (first, last) =
            set.split_once('-').ok_or_else(|| ParseError::unsupported_range(format!("invalid range {set:?}")))?;
        let (first, last) = (parse_position(first)?, parse_position(last)?);
        ensure!(first <= last, ParseError::unsupported_range(format!("inverted range {set:?}")));
        let start = length.min(first);
        ByteRange { start, length: (length - start).min(last + 1 - first) }
    };

    ensure!(range.length > 0, ParseError::unsupported_range(format!("unsatisfiable range {set:?}")));
    Ok(range)
}

fn parse_position(s: &str) -> Result<u64, ParseError> {
    s.trim().parse::<u64>().map_err(|_| ParseError::unsupported_range(format!("invalid range position {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_forms() {
        assert_eq!(parse_range("bytes=0-99", 1000).unwrap(), ByteRange { start: 0, length: 100 });
        assert_eq!(parse_range("bytes=900-", 1000).unwrap(), ByteRange { start: 900, length: 100 });
        assert_eq!(parse_range("bytes=-100", 1000).unwrap(), ByteRange { start: 900, length: 100 });
        assert_eq!(parse_range("Bytes=-5000", 1000).unwrap(), ByteRange { start: 0, length: 1000 });
        assert_eq!(parse_range("bytes=990-2000", 1000).unwrap(), ByteRange { start: 990, length: 10 });
    }

    #[test]
    fn test_content_range() {
        let range = parse_range("bytes=10-19", 50).unwrap();
        assert_eq!(range.end(), 19);
        assert_eq!(range.content_range(50), "bytes 10-19/50");
    }

    #[test]
    fn test_unsupported_ranges() {
        for value in ["items=0-1", "bytes=0-1,5-6", "bytes=a-b", "bytes=5-2", "bytes=1000-", "bytes=-0", "bytes="] {
            assert!(matches!(parse_range(value, 1000), Err(ParseError::UnsupportedRange { .. })), "{value}");
        }
    }
}
