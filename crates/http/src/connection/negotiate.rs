//! Turns a handler's answer into bytes on the wire.
//!
//! Before the head is written the response is negotiated against the request: default
//! fields are filled in, a single byte range is honored for range capable content, gzip is
//! applied to compressible types the client accepts, the framing follows from the (possibly
//! compressed) length, and the keep-alive budget decides the `connection` field.

use crate::buffer::{DynWrite, OutputBuffer};
use crate::codec::header::HeaderEncoder;
use crate::content::{Content, EmptyContent, ResponseSink, Transfer};
use crate::protocol::{
    ByteRange, PayloadSize, RequestHead, ResponseHead, SendError, is_bytes_range, parse_range, status_response,
};
use crate::server::ServerState;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use std::time::Duration;
use tracing::{debug, trace};

/// Bodies below this size grow when compressed.
const GZIP_MIN_LENGTH: u64 = 40;
/// Bodies below this size are compressed in memory so the compressed length can be sent.
const GZIP_MEMORY_LENGTH: u64 = 8192;

const GZIP_TYPES: [&str; 7] = [
    "text/plain",
    "text/css",
    "text/html",
    "application/javascript",
    "application/xml",
    "application/json",
    "image/svg+xml",
];

const NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache, must-revalidate");

/// The answer a handler assembled, not yet sent.
#[derive(Default)]
pub(crate) struct PendingResponse {
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: HeaderMap,
    pub(crate) content: Option<Box<dyn Content>>,
    /// Explicit gzip decision, overriding the content type allow-list.
    pub(crate) gzip: Option<bool>,
}

impl PendingResponse {
    /// Fills in the status and content of an unanswered request.
    pub(crate) fn settle(&mut self, method: &Method) {
        match (&self.content, self.status) {
            (None, None) if method == Method::GET || method == Method::HEAD => {
                self.status = Some(StatusCode::NOT_FOUND);
                self.content = Some(Box::new(crate::content::BytesContent::text("File not found\r\n")));
            }
            (None, None) => self.status = Some(StatusCode::METHOD_NOT_ALLOWED),
            (Some(_), None) => self.status = Some(StatusCode::OK),
            (_, Some(_)) => {}
        }
    }
}

/// Keep-alive grant for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeepAlive {
    pub(crate) timeout: Duration,
    pub(crate) max: i64,
}

/// How the body of one response goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Plan {
    pub(crate) transfer: Transfer,
    pub(crate) range: Option<ByteRange>,
}

/// Settles range, compression and framing, updating `head` to match.
pub(crate) fn plan(request: &RequestHead, head: &mut ResponseHead, content: &dyn Content, allow_gzip: bool, gzip: Option<bool>) -> Plan {
    let length = content.try_compute_length();
    let range_header = request.header_str(header::RANGE.as_str()).filter(|value| is_bytes_range(value));

    let mut range = None;
    if let Some(length) = length.filter(|_| content.supports_ranges()) {
        head.headers_mut().insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Some(value) = &range_header {
            match parse_range(value, length) {
                Ok(r) => {
                    if head.status() == StatusCode::OK {
                        *head.status_mut() = StatusCode::PARTIAL_CONTENT;
                    }
                    if let Ok(value) = HeaderValue::try_from(r.content_range(length)) {
                        head.headers_mut().insert(header::CONTENT_RANGE, value);
                    }
                    range = Some(r);
                }
                Err(e) => debug!(cause = %e, range = %value, "ignore range request"),
            }
        }
    }

    let compressible = gzip.unwrap_or_else(|| {
        head.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| GZIP_TYPES.iter().any(|t| ct.starts_with(t)))
    });
    let use_gzip = compressible
        && allow_gzip
        && request.accepts_gzip()
        && range_header.is_none()
        && length.is_none_or(|n| n >= GZIP_MIN_LENGTH);

    let transfer = if request.method() == Method::HEAD {
        Transfer::Discard
    } else if range.is_some() {
        Transfer::Direct
    } else {
        match (use_gzip, length) {
            (true, Some(n)) if n < GZIP_MEMORY_LENGTH => Transfer::GzipMemory,
            (true, _) => Transfer::GzipChunked,
            (false, Some(_)) => Transfer::Direct,
            (false, None) => Transfer::Chunked,
        }
    };
    if matches!(transfer, Transfer::GzipMemory | Transfer::GzipChunked) {
        head.headers_mut().insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    Plan { transfer, range }
}

fn payload_size(length: Option<u64>) -> PayloadSize {
    match length {
        Some(0) => PayloadSize::Empty,
        Some(n) => PayloadSize::Length(n),
        None => PayloadSize::Chunked,
    }
}

/// Negotiates and writes one response, then flushes.
pub(crate) async fn send_response(
    output: &mut OutputBuffer<DynWrite>,
    state: &ServerState,
    request: &RequestHead,
    response: PendingResponse,
    keep_alive: Option<KeepAlive>,
) -> Result<(), SendError> {
    let config = state.config();
    let mut content = response.content.unwrap_or_else(|| Box::new(EmptyContent));

    let mut head = status_response(response.status.unwrap_or(StatusCode::OK));
    *head.headers_mut() = response.headers;
    let headers = head.headers_mut();
    if !headers.contains_key(header::SERVER) {
        if let Ok(value) = HeaderValue::try_from(config.server_name.as_str()) {
            headers.insert(header::SERVER, value);
        }
    }
    if !headers.contains_key(header::DATE) {
        if let Some(date) = state.date().http_date() {
            headers.insert(header::DATE, date);
        }
    }
    if !headers.contains_key(header::CONTENT_TYPE) {
        if let Some(value) = content.content_type().and_then(|ct| HeaderValue::try_from(ct).ok()) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, NO_CACHE);
    }

    let plan = plan(request, &mut head, content.as_ref(), config.allow_gzip, response.gzip);

    let mut compressed = None;
    if plan.transfer == Transfer::GzipMemory {
        let mut sink = ResponseSink::new(output, Transfer::GzipMemory);
        content.copy_to(&mut sink).await?;
        compressed = sink.finish().await?;
    }

    let size = match (plan.range, &compressed, plan.transfer) {
        (Some(range), ..) => PayloadSize::Length(range.length),
        (None, Some(bytes), _) => payload_size(Some(bytes.len() as u64)),
        (None, None, Transfer::GzipChunked) => PayloadSize::Chunked,
        (None, None, _) => payload_size(content.try_compute_length()),
    };

    let headers = head.headers_mut();
    match keep_alive {
        Some(KeepAlive { timeout, max }) => {
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
            let value = format!("timeout={},max={max}", timeout.as_secs());
            if let Ok(value) = HeaderValue::try_from(value) {
                headers.insert("keep-alive", value);
            }
        }
        None => {
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
    }

    let status = head.status();
    trace!(%status, transfer = ?plan.transfer, range = ?plan.range, ?size, "send response");
    output.encode(&mut HeaderEncoder, (head, size)).await?;

    if let Some(bytes) = compressed {
        output.write(&bytes).await?;
    } else if plan.transfer != Transfer::Discard && size != PayloadSize::Empty {
        let mut sink = ResponseSink::new(output, plan.transfer);
        match plan.range {
            Some(range) => content.copy_range_to(&mut sink, range.start, range.length).await?,
            None => content.copy_to(&mut sink).await?,
        }
        sink.finish().await?;
    }
    output.flush().await?;
    Ok(())
}

/// Answers an unparseable request before the connection is dropped.
pub(crate) async fn send_bad_request(output: &mut OutputBuffer<DynWrite>) -> Result<(), SendError> {
    let mut head = status_response(StatusCode::BAD_REQUEST);
    head.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
    output.encode(&mut HeaderEncoder, (head, PayloadSize::Empty)).await?;
    output.flush().await?;
    Ok(())
}
