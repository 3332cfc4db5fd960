//! Request handlers.
//!
//! A [`Handler`] inspects the [`HttpContext`] of one request and answers by setting a status,
//! headers and content on it, or by taking the connection over as a WebSocket. Anything it
//! leaves unanswered is synthesized by the connection (404 for `GET`, 405 otherwise).

use crate::connection::HttpContext;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerError = Box<dyn Error + Send + Sync>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut HttpContext<'_>) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, ctx: &mut HttpContext<'_>) -> Result<(), HandlerError> {
        (**self).handle(ctx).await
    }
}

pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Err> Handler for HandlerFn<F>
where
    F: for<'a, 'c> Fn(&'a mut HttpContext<'c>) -> BoxFuture<'a, Result<(), Err>> + Send + Sync,
    Err: Into<HandlerError> + Send + 'static,
{
    async fn handle(&self, ctx: &mut HttpContext<'_>) -> Result<(), HandlerError> {
        (self.f)(ctx).await.map_err(Into::into)
    }
}

/// Wraps a closure returning a boxed future:
///
/// ```no_run
/// use micro_wire::content::BytesContent;
/// use micro_wire::handler::{HandlerError, make_handler};
///
/// let handler = make_handler(|ctx| {
///     Box::pin(async move {
///         let name = ctx.request().query("name").unwrap_or("world").to_string();
///         ctx.set_content(BytesContent::text(format!("hello {name}")));
///         Ok::<_, HandlerError>(())
///     })
/// });
/// # drop(handler);
/// ```
pub fn make_handler<F, Err>(f: F) -> HandlerFn<F>
where
    F: for<'a, 'c> Fn(&'a mut HttpContext<'c>) -> BoxFuture<'a, Result<(), Err>> + Send + Sync,
    Err: Into<HandlerError> + Send + 'static,
{
    HandlerFn { f }
}

/// Runs handlers in order until one of them answers the request.
#[derive(Default, Clone)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain").field("len", &self.handlers.len()).finish()
    }
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn push<H: Handler + 'static>(&mut self, handler: H) {
        self.handlers.push(Arc::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl Handler for HandlerChain {
    async fn handle(&self, ctx: &mut HttpContext<'_>) -> Result<(), HandlerError> {
        for handler in &self.handlers {
            handler.handle(ctx).await?;
            if ctx.is_handled() {
                break;
            }
        }
        Ok(())
    }
}
