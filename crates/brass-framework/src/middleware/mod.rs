//! Middleware composition and built-in middleware.
//!
//! A [`Middleware`] turns the next handler of the chain into a replacement
//! handler. It may call `next`, skip it, or call it conditionally; skipping
//! ends processing of the update without an error.
//!
//! [`compose`] applies a list right-to-left so that `middleware[0]` is the
//! outermost layer: it runs first on the way in and last on the way out.
//!
//! ```rust,ignore
//! let timing = Middleware::from_fn(|ctx, next| async move {
//!     let start = std::time::Instant::now();
//!     let result = next.call(ctx).await;
//!     tracing::debug!(elapsed = ?start.elapsed(), "handled");
//!     result
//! });
//! router.use_middleware(timing);
//! ```
//!
//! Built-in middleware, each configurable with a [`Skipper`]:
//!
//! - [`logger`]: one structured log line per update;
//! - [`recover`]: turns panics below it into errors;
//! - [`whitelist`] / [`blacklist`]: sender-based access control;
//! - [`auto_respond`]: answers callbacks after the handler ran.

pub mod access;
pub mod auto_respond;
pub mod logger;
pub mod recover;

use std::future::Future;
use std::sync::Arc;

use tower::{Service, ServiceExt};
use tower_layer::Layer;

use crate::context::Context;
use crate::error::{BoxError, HandlerResult};
use crate::handler::{BoxedHandler, HandlerService};

pub use access::{blacklist, whitelist};
pub use auto_respond::{AutoRespondConfig, auto_respond, auto_respond_with_config};
pub use logger::{LoggerConfig, logger, logger_with_config};
pub use recover::{RecoverConfig, recover, recover_with_config};

// ============================================================================
// Skipper
// ============================================================================

/// Decides per update whether a built-in middleware steps aside and just
/// calls `next`.
pub type Skipper = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// A skipper that never skips.
pub fn default_skipper() -> Skipper {
    Arc::new(|_ctx: &Context| false)
}

// ============================================================================
// Middleware
// ============================================================================

type WrapFn = dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync;

/// A transform from the next handler to a replacement handler.
#[derive(Clone)]
pub struct Middleware(Arc<WrapFn>);

impl Middleware {
    /// Creates middleware from a handler transform.
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(wrap))
    }

    /// Creates middleware from an async function of the context and the
    /// next handler.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Context>, BoxedHandler) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |next| {
            let f = Arc::clone(&f);
            BoxedHandler::new(move |ctx| f(ctx, next.clone()))
        })
    }

    /// Adapts a tower [`Layer`] into middleware.
    ///
    /// The layer wraps a [`HandlerService`] for the next handler; its
    /// responses are discarded and its errors are boxed.
    pub fn from_layer<L>(layer: L) -> Self
    where
        L: Layer<HandlerService> + Send + Sync + 'static,
        L::Service: Service<Arc<Context>> + Clone + Send + Sync + 'static,
        <L::Service as Service<Arc<Context>>>::Future: Send + 'static,
        <L::Service as Service<Arc<Context>>>::Error: Into<BoxError>,
    {
        Self::new(move |next| {
            let svc = layer.layer(HandlerService::new(next));
            BoxedHandler::new(move |ctx| {
                let svc = svc.clone();
                async move {
                    svc.oneshot(ctx)
                        .await
                        .map(|_| ())
                        .map_err(Into::<BoxError>::into)
                }
            })
        })
    }

    /// Wraps `next`.
    pub fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        (self.0)(next)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware").finish_non_exhaustive()
    }
}

/// Wraps `handler` in `middleware` so that `middleware[0]` is outermost.
pub fn compose(handler: BoxedHandler, middleware: &[Middleware]) -> BoxedHandler {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, m| m.apply(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::tests::message;
    use crate::testing::context_for;
    use parking_lot::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn ctx() -> Arc<Context> {
        Arc::new(context_for(message(Some("hi"), vec![])).0)
    }

    fn tracing_mw(log: &Log, name: &'static str) -> Middleware {
        let log = Arc::clone(log);
        Middleware::from_fn(move |ctx, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}:in"));
                let result = next.call(ctx).await;
                log.lock().push(format!("{name}:out"));
                result
            }
        })
    }

    fn recording_handler(log: &Log) -> BoxedHandler {
        let log = Arc::clone(log);
        BoxedHandler::new(move |_ctx| {
            let log = Arc::clone(&log);
            async move { log.lock().push("handler".into()) }
        })
    }

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let log: Log = Arc::default();
        let chain = compose(
            recording_handler(&log),
            &[
                tracing_mw(&log, "m1"),
                tracing_mw(&log, "m2"),
                tracing_mw(&log, "m3"),
            ],
        );

        chain.call(ctx()).await.unwrap();

        assert_eq!(
            *log.lock(),
            ["m1:in", "m2:in", "m3:in", "handler", "m3:out", "m2:out", "m1:out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_stops_the_chain() {
        let log: Log = Arc::default();
        let stop = {
            let log = Arc::clone(&log);
            Middleware::from_fn(move |_ctx, _next| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push("m2".into());
                    Ok(())
                }
            })
        };

        let chain = compose(
            recording_handler(&log),
            &[tracing_mw(&log, "m1"), stop, tracing_mw(&log, "m3")],
        );

        assert!(chain.call(ctx()).await.is_ok());
        assert_eq!(*log.lock(), ["m1:in", "m2", "m1:out"]);
    }

    #[tokio::test]
    async fn test_empty_list_returns_handler() {
        let log: Log = Arc::default();
        compose(recording_handler(&log), &[])
            .call(ctx())
            .await
            .unwrap();
        assert_eq!(*log.lock(), ["handler"]);
    }

    #[tokio::test]
    async fn test_from_layer_wraps_with_tower() {
        let log: Log = Arc::default();
        let chain = compose(
            recording_handler(&log),
            &[Middleware::from_layer(tower::timeout::TimeoutLayer::new(
                Duration::from_secs(5),
            ))],
        );

        chain.call(ctx()).await.unwrap();
        assert_eq!(*log.lock(), ["handler"]);
    }

    #[tokio::test]
    async fn test_from_layer_propagates_errors() {
        let failing = BoxedHandler::new(|_ctx| async { Err::<(), _>("nope") });
        let chain = compose(
            failing,
            &[Middleware::from_layer(tower_layer::Identity::new())],
        );

        let err = chain.call(ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
