use super::{ClientError, ClientRequest, HttpClient};
use bytes::Bytes;
use http::{Method, Response, StatusCode, Uri, header};
use std::fmt;
use tracing::info;

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Sends `request` to the `http://` `url` on a fresh connection and reads the whole response.
///
/// The url supplies the path and query; parameters added to `request` are appended. With
/// `follow_redirects`, a `301`, `302`, `303` or `307` carrying a `location` is followed on a
/// new connection, up to five times. A `303` switches to a bodiless `GET`. Other redirects of
/// a request with content are returned as they are, since the content can only be sent once.
pub async fn fetch(
    url: &str,
    mut request: ClientRequest,
    follow_redirects: bool,
) -> Result<Response<Bytes>, ClientError> {
    let mut target = Target::parse(url)?;
    request.set_path(target.path.clone());

    for _ in 0..=MAX_REDIRECTS {
        let method = request.method().clone();
        let mut headers = request.headers().clone();
        let has_content = request.has_content();

        let mut client = HttpClient::connect(&target.host, target.port).await?;
        client.send(request).await?;
        let response = client.response().await?;

        let status = response.status();
        let location = response.header_str(header::LOCATION).map(str::to_string);
        let redirect = match location {
            Some(location)
                if follow_redirects && is_redirect(status) && (!has_content || status == StatusCode::SEE_OTHER) =>
            {
                location
            }
            _ => return Ok(response.into_full().await?),
        };
        drop(response);
        client.close().await?;

        let next = target.join(&redirect)?;
        info!(%status, from = %target, to = %next, "following redirect");
        let method = if status == StatusCode::SEE_OTHER { Method::GET } else { method };
        headers.remove(header::HOST);
        request = ClientRequest::new(method, next.path.clone());
        *request.headers_mut() = headers;
        target = next;
    }
    Err(ClientError::TooManyRedirects { count: MAX_REDIRECTS + 1 })
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER | StatusCode::TEMPORARY_REDIRECT
    )
}

/// Where a request goes: host, port and the path with its query.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

impl Target {
    fn parse(url: &str) -> Result<Self, ClientError> {
        let uri = Uri::try_from(url).map_err(|e| ClientError::invalid_url(url, e))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(ClientError::invalid_url(url, format!("unsupported scheme {other:?}"))),
            None => return Err(ClientError::invalid_url(url, "missing scheme")),
        }
        let host = uri.host().filter(|h| !h.is_empty()).ok_or_else(|| ClientError::invalid_url(url, "missing host"))?;
        Ok(Self {
            host: host.to_string(),
            port: uri.port_u16().unwrap_or(80),
            path: uri.path_and_query().map_or_else(|| "/".to_string(), |p| p.as_str().to_string()),
        })
    }

    /// Resolves a `location`: absolute urls replace the target, absolute paths keep its host.
    fn join(&self, location: &str) -> Result<Self, ClientError> {
        if location.starts_with('/') && !location.starts_with("//") {
            return Ok(Self { path: location.to_string(), ..self.clone() });
        }
        Self::parse(location)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}
