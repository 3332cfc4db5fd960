//! Response heads.
//!
//! A response head is a plain `http::Response<()>`: the body travels separately as
//! [`Content`](crate::content::Content) and the framing fields are settled when the head is
//! encoded.

use crate::ensure;
use crate::protocol::ParseError;
use http::{Response, StatusCode, Version};

pub type ResponseHead = Response<()>;

/// A bare head with `status` and no fields.
pub fn status_response(status: StatusCode) -> ResponseHead {
    let mut head = Response::new(());
    *head.status_mut() = status;
    head
}

/// Parses `HTTP/1.x SP code [SP reason]`, returning the reason as sent (possibly empty).
pub fn parse_status_line(line: &str) -> Result<(Version, StatusCode, String), ParseError> {
    let (protocol, rest) =
        line.split_once(' ').ok_or_else(|| ParseError::malformed_line(format!("invalid status line {line:?}")))?;
    let version = match protocol {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        other => return Err(ParseError::malformed_line(format!("unsupported protocol {other:?}"))),
    };

    let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
    ensure!(code.len() == 3, ParseError::malformed_line(format!("invalid status code {code:?}")));
    let status = StatusCode::from_bytes(code.as_bytes())
        .map_err(|_| ParseError::malformed_line(format!("invalid status code {code:?}")))?;
    Ok((version, status, reason.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response() {
        let head = status_response(StatusCode::NOT_FOUND);
        assert_eq!(head.status(), StatusCode::NOT_FOUND);
        assert!(head.headers().is_empty());
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(
            parse_status_line("HTTP/1.1 404 Not Found").unwrap(),
            (Version::HTTP_11, StatusCode::NOT_FOUND, "Not Found".to_string())
        );
        assert_eq!(parse_status_line("HTTP/1.0 204").unwrap(), (Version::HTTP_10, StatusCode::NO_CONTENT, String::new()));
        assert_eq!(parse_status_line("HTTP/1.1 599 Custom reason").unwrap().1.as_u16(), 599);
    }

    #[test]
    fn test_malformed_status_lines() {
        for line in ["HTTP/1.1", "HTTP/2 200 OK", "ICY 200 OK", "HTTP/1.1 2000 OK", "HTTP/1.1 abc OK", "HTTP/1.1 099"] {
            assert!(matches!(parse_status_line(line), Err(ParseError::MalformedLine { .. })), "{line}");
        }
    }
}
