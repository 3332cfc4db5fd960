//! MIME style header block reader.
//!
//! The same reader serves request headers and multipart part headers. Folded continuation
//! lines are joined to the previous field before it is split, repeated fields overwrite each
//! other, and RFC 2047 encoded words in values are decoded.

use super::encoded_word::decode_encoded_words;
use crate::buffer::SharedRead;
use crate::codec::line::{LineScanner, read_line};
use crate::ensure;
use crate::protocol::ParseError;
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

/// Maximum number of fields accepted in one header block.
pub const MAX_HEADER_NUM: usize = 100;

/// Reads header lines from `src` until the terminating empty line.
pub async fn read_headers<S>(src: &mut S, scanner: &mut LineScanner) -> Result<HeaderMap, ParseError>
where
    S: SharedRead + ?Sized,
{
    let mut headers = HeaderMap::new();
    let mut pending: Option<String> = None;
    let mut fields = 0usize;

    loop {
        let Some(line) = read_line(src, scanner).await? else {
            return Err(ParseError::malformed_header("unexpected end of stream inside header block"));
        };

        if line.starts_with([' ', '\t']) {
            match pending.as_mut() {
                Some(field) => field.push_str(&line),
                None => return Err(ParseError::malformed_header("continuation line without a field")),
            }
            continue;
        }

        if let Some(field) = pending.take() {
            fields += 1;
            ensure!(fields <= MAX_HEADER_NUM, ParseError::too_many_headers(MAX_HEADER_NUM));
            insert_field(&mut headers, &field)?;
        }

        if line.is_empty() {
            trace!(fields, "read header block");
            return Ok(headers);
        }
        pending = Some(line);
    }
}

/// Splits one unfolded `name: value` line and stores it, replacing any previous value.
pub fn insert_field(headers: &mut HeaderMap, field: &str) -> Result<(), ParseError> {
    let colon = match field.find(':') {
        Some(0) | None => return Err(ParseError::malformed_header(format!("missing field name in {field:?}"))),
        Some(pos) => pos,
    };

    let name = HeaderName::from_bytes(field[..colon].as_bytes())
        .map_err(|e| ParseError::malformed_header(format!("invalid field name {:?}: {e}", &field[..colon])))?;

    let raw_value = &field[colon + 1..];
    let raw_value = raw_value.strip_prefix(' ').unwrap_or(raw_value);
    let value = decode_encoded_words(raw_value)?;
    let value = HeaderValue::from_bytes(value.as_bytes())
        .map_err(|e| ParseError::malformed_header(format!("invalid value for {name}: {e}")))?;

    headers.insert(name, value);
    Ok(())
}
