//! Cached `date` header value.
//!
//! Formatting an HTTP date on every response is wasteful, so the value is formatted by a
//! background task and swapped in atomically.

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Keeps the current HTTP date, refreshed by a background task that stops on drop.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: JoinHandle<()>,
}

impl DateService {
    /// Starts the refresh task; must be called within a tokio runtime.
    pub fn start(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(now()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                current_arc.store(Arc::new(now()));
            }
        });

        DateService { current, handle }
    }

    pub fn http_date(&self) -> Option<HeaderValue> {
        let date = self.current.load().as_ref().clone();
        HeaderValue::from_maybe_shared(date).ok()
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_date() {
        let service = DateService::start(Duration::from_millis(800));
        let date = service.http_date().unwrap();
        let date = date.to_str().unwrap();
        assert_eq!(date.len(), 29);
        assert!(date.ends_with(" GMT"));
    }
}
