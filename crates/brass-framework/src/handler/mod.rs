//! Handlers.
//!
//! A handler is any async function of `Arc<Context>` returning `()` or a
//! `Result<(), E>` whose error converts into [`BoxError`]:
//!
//! ```rust,ignore
//! async fn ping(ctx: Arc<Context>) -> Result<(), ContextError> {
//!     ctx.reply("pong", SendOptions::new()).await?;
//!     Ok(())
//! }
//!
//! router.handle("/ping", ping);
//! router.handle(Endpoint::TEXT, |ctx: Arc<Context>| async move {
//!     tracing::info!(text = ctx.text(), "got text");
//! });
//! ```
//!
//! Registered handlers are erased into a [`BoxedHandler`], the unit that
//! [`Middleware`](crate::Middleware) wraps and the dispatcher calls.
//! [`service::HandlerService`] exposes a boxed handler as a tower `Service`.

pub mod service;

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::{BoxError, HandlerResult};

pub use service::HandlerService;

// ============================================================================
// IntoHandlerResult
// ============================================================================

/// Return types a handler may produce.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ============================================================================
// BoxedHandler
// ============================================================================

type HandlerFn = dyn Fn(Arc<Context>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A type-erased handler. Cloning is cheap.
#[derive(Clone)]
pub struct BoxedHandler(Arc<HandlerFn>);

impl BoxedHandler {
    /// Erases an async function into a boxed handler.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        Self(Arc::new(move |ctx: Arc<Context>| {
            let fut = f(ctx);
            async move { fut.await.into_handler_result() }.boxed()
        }))
    }

    /// A handler that does nothing and succeeds.
    pub fn noop() -> Self {
        Self::new(|_ctx| async {})
    }

    /// Runs the handler.
    pub fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
        (self.0)(ctx)
    }
}

impl std::fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedHandler").finish_non_exhaustive()
    }
}

/// Converts a handler function into a boxed handler.
pub fn into_handler<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    BoxedHandler::new(f)
}
