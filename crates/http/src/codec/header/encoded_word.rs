//! Decoding of RFC 2047 encoded words of the form `=?charset?Q?=XX=XX?=`.
//!
//! Browsers still send multipart file names this way. Only the fully escaped Q form is
//! recognized; anything that does not match is kept verbatim.

use crate::protocol::ParseError;
use std::borrow::Cow;

const PREFIX: &str = "=?";
const SUFFIX: &str = "?=";

/// Replaces every encoded word in `input` by its decoded text.
pub fn decode_encoded_words(input: &str) -> Result<Cow<'_, str>, ParseError> {
    if !input.contains(PREFIX) {
        return Ok(Cow::Borrowed(input));
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    let mut decoded_any = false;

    while let Some(start) = rest.find(PREFIX) {
        match parse_encoded_word(&rest[start..]) {
            Some((charset, bytes, consumed)) => {
                output.push_str(&rest[..start]);
                output.push_str(&decode_charset(charset, &bytes)?);
                rest = &rest[start + consumed..];
                decoded_any = true;
            }
            None => {
                output.push_str(&rest[..start + PREFIX.len()]);
                rest = &rest[start + PREFIX.len()..];
            }
        }
    }

    if !decoded_any {
        return Ok(Cow::Borrowed(input));
    }
    output.push_str(rest);
    Ok(Cow::Owned(output))
}

/// Parses one encoded word at the start of `s`, returning charset, raw bytes and length.
fn parse_encoded_word(s: &str) -> Option<(&str, Vec<u8>, usize)> {
    let body = s.strip_prefix(PREFIX)?;
    let charset_end = body.find('?')?;
    if charset_end == 0 {
        return None;
    }
    let charset = &body[..charset_end];
    let mut payload = body[charset_end..].strip_prefix("?Q?")?.as_bytes();

    let mut bytes = Vec::new();
    while let [b'=', high, low, tail @ ..] = payload {
        match (upper_hex(*high), upper_hex(*low)) {
            (Some(high), Some(low)) => bytes.push(high << 4 | low),
            _ => break,
        }
        payload = tail;
    }

    if bytes.is_empty() || !payload.starts_with(SUFFIX.as_bytes()) {
        return None;
    }

    let consumed = s.len() - payload.len() + SUFFIX.len();
    Some((charset, bytes, consumed))
}

fn upper_hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_charset<'a>(charset: &str, bytes: &'a [u8]) -> Result<Cow<'a, str>, ParseError> {
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(String::from_utf8_lossy(bytes)),
        "iso-8859-1" | "latin1" | "us-ascii" | "ascii" => Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
        other => Err(ParseError::malformed_header(format!("unknown encoded word charset {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        let decoded = decode_encoded_words("form-data; name=\"file\"").unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_utf8_word() {
        let decoded = decode_encoded_words("filename=\"=?utf-8?Q?=C3=A9t=C3=A9?=\"").unwrap();
        // only the escaped run is part of the word, the trailing text stays untouched
        assert_eq!(decoded, "filename=\"=?utf-8?Q?=C3=A9t=C3=A9?=\"");

        let decoded = decode_encoded_words("filename=\"=?utf-8?Q?=C3=A9=74=C3=A9?=\"").unwrap();
        assert_eq!(decoded, "filename=\"été\"");
    }

    #[test]
    fn test_decode_latin1_word() {
        let decoded = decode_encoded_words("a =?ISO-8859-1?Q?=E9?= b").unwrap();
        assert_eq!(decoded, "a é b");
    }

    #[test]
    fn test_lowercase_hex_is_not_a_word() {
        let decoded = decode_encoded_words("=?utf-8?Q?=c3=a9?=").unwrap();
        assert_eq!(decoded, "=?utf-8?Q?=c3=a9?=");
    }

    #[test]
    fn test_unknown_charset_fails() {
        let result = decode_encoded_words("=?koi8-r?Q?=C1?=");
        assert!(matches!(result, Err(ParseError::MalformedHeader { .. })));
    }
}
