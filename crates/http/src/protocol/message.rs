use crate::protocol::ParseError;
use bytes::{Buf, Bytes};
use http::{HeaderMap, header};

/// One item of an outgoing payload: a chunk of data, or the end of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How a message body is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    Empty,
}

impl PayloadSize {
    /// Framing announced by a header block: `content-length` first, then chunked, else no body.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ParseError> {
        if let Some(value) = headers.get(header::CONTENT_LENGTH) {
            let length = value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or_else(|| ParseError::malformed_header(format!("invalid content-length {value:?}")))?;
            return Ok(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) });
        }
        let chunked = headers
            .get(header::TRANSFER_ENCODING)
            .is_some_and(|v| v.to_str().is_ok_and(|v| v.trim().eq_ignore_ascii_case("chunked")));
        Ok(if chunked { PayloadSize::Chunked } else { PayloadSize::Empty })
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Known body length, `Empty` counting as zero.
    #[inline]
    pub fn length(&self) -> Option<u64> {
        match self {
            PayloadSize::Length(n) => Some(*n),
            PayloadSize::Empty => Some(0),
            PayloadSize::Chunked => None,
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
