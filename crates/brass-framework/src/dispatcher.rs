//! Update dispatcher.
//!
//! The [`Dispatcher`] takes decoded updates off the queue and runs each one
//! on its own tracked task:
//!
//! 1. resolve the endpoint and build the [`Context`];
//! 2. run the pre-middleware around the lookup step;
//! 3. if a handler matches, run `use` middleware, group middleware,
//!    per-handler middleware and the handler;
//! 4. report a terminal error or a caught panic to the error sink.
//!
//! Updates that resolve to an empty endpoint are dropped before any
//! middleware runs. A failure in one update never affects another.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(router, client)
//!     .with_cancellation(token.clone())
//!     .with_error_sink(Arc::new(|err, _ctx| eprintln!("{err}")));
//!
//! dispatcher.run(rx).await; // returns once the queue closed and all tasks finished
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use brass_core::{BoxedClient, RetryPolicy, Update};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, error};

use crate::context::Context;
use crate::endpoint::resolve;
use crate::error::{BotError, install_panic_hook};
use crate::handler::BoxedHandler;
use crate::middleware::compose;
use crate::router::Router;

/// Receives every terminal per-update failure, with the context when one
/// was built.
pub type ErrorSink = Arc<dyn Fn(&BotError, Option<&Context>) + Send + Sync>;

/// The sink used when none is configured: logs at `error` level.
pub fn default_error_sink() -> ErrorSink {
    Arc::new(|err: &BotError, ctx: Option<&Context>| match err {
        BotError::Panic { backtrace, .. } => error!(
            endpoint = ctx.map(|c| c.endpoint().to_string()),
            error = %err,
            backtrace = %backtrace,
            "Update processing panicked"
        ),
        BotError::Handler { .. } => error!(
            endpoint = ctx.map(|c| c.endpoint().to_string()),
            error = %err,
            "Update processing failed"
        ),
    })
}

/// Runs one task per update against an immutable [`Router`].
///
/// Cloning is cheap; clones share the router, the task tracker and the
/// cancellation token.
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    chain: BoxedHandler,
    client: BoxedClient,
    retry: Arc<RetryPolicy>,
    cancel: CancellationToken,
    on_error: ErrorSink,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Creates a dispatcher over a snapshot of `router`.
    ///
    /// Installs the process-wide hook that records panic backtraces.
    pub fn new(router: impl Into<Arc<Router>>, client: BoxedClient) -> Self {
        install_panic_hook();
        let router = router.into();
        Self {
            chain: build_chain(&router),
            router,
            client,
            retry: Arc::new(RetryPolicy::default()),
            cancel: CancellationToken::new(),
            on_error: default_error_sink(),
            tracker: TaskTracker::new(),
        }
    }

    /// Sets the policy used by context operations.
    pub fn with_retry_policy(mut self, policy: impl Into<Arc<RetryPolicy>>) -> Self {
        self.retry = policy.into();
        self
    }

    /// Sets the token handed to every context.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.on_error = sink;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Number of update tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Spawns a tracked task that processes `update`.
    pub fn dispatch(&self, update: Update) {
        let this = self.clone();
        self.tracker.spawn(async move { this.process(update).await });
    }

    /// Processes `update` on the current task.
    pub async fn process(&self, update: Update) {
        let span = debug_span!("dispatch", update_type = update.type_tag());
        self.process_inner(update).instrument(span).await
    }

    async fn process_inner(&self, update: Update) {
        let built = std::panic::catch_unwind(AssertUnwindSafe(|| self.build_context(update)));
        let ctx = match built {
            Ok(Some(ctx)) => Arc::new(ctx),
            Ok(None) => {
                debug!("Update has no endpoint, dropped");
                return;
            }
            Err(payload) => {
                (self.on_error)(&BotError::panic(payload.as_ref()), None);
                return;
            }
        };

        let endpoint = ctx.endpoint().clone();
        debug!(%endpoint, "Dispatching update");

        let chain = self.chain.clone();
        let run_ctx = Arc::clone(&ctx);
        let outcome = AssertUnwindSafe(async move { chain.call(run_ctx).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => (self.on_error)(&BotError::handler(endpoint, source), Some(&ctx)),
            Err(payload) => (self.on_error)(&BotError::panic(payload.as_ref()), Some(&ctx)),
        }
    }

    fn build_context(&self, update: Update) -> Option<Context> {
        let resolution = resolve(&update);
        if resolution.endpoint.is_empty() {
            return None;
        }
        Some(Context::new(
            update,
            resolution,
            Arc::clone(&self.client),
            Arc::clone(&self.retry),
            self.cancel.clone(),
        ))
    }

    /// Dispatches every update from `rx` until the channel closes, then
    /// waits for all in-flight tasks.
    pub async fn run(&self, mut rx: mpsc::Receiver<Update>) {
        while let Some(update) = rx.recv().await {
            self.dispatch(update);
        }
        debug!(in_flight = self.in_flight(), "Update queue closed, draining");
        self.shutdown().await;
    }

    /// Stops accepting tasks and waits for the running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Pre-middleware wrapped around the lookup step.
fn build_chain(router: &Arc<Router>) -> BoxedHandler {
    let lookup = {
        let router = Arc::clone(router);
        BoxedHandler::new(move |ctx: Arc<Context>| {
            let route = router
                .find(ctx.endpoint(), ctx.update())
                .map(|route| route.chain(router.middleware()));
            async move {
                match route {
                    Some(chain) => chain.call(ctx).await,
                    None => {
                        debug!(endpoint = %ctx.endpoint(), "No handler matched");
                        Ok(())
                    }
                }
            }
        })
    };
    compose(lookup, router.pre_middleware())
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::endpoint::tests::{callback, message};
    use crate::middleware::Middleware;
    use crate::testing::RecordingClient;
    use brass_core::UnknownUpdate;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Reported {
        panic: bool,
        endpoint: Option<String>,
        with_context: bool,
    }

    fn capture() -> (ErrorSink, Arc<Mutex<Vec<Reported>>>) {
        let seen: Arc<Mutex<Vec<Reported>>> = Arc::default();
        let sink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |err: &BotError, ctx: Option<&Context>| {
                seen.lock().push(Reported {
                    panic: err.is_panic(),
                    endpoint: err.endpoint().map(ToString::to_string),
                    with_context: ctx.is_some(),
                });
            }) as ErrorSink
        };
        (sink, seen)
    }

    fn dispatcher(router: Router) -> (Dispatcher, Arc<Mutex<Vec<Reported>>>) {
        let (sink, seen) = capture();
        let client = Arc::new(RecordingClient::default());
        (Dispatcher::new(router, client).with_error_sink(sink), seen)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(Arc<Context>) -> futures::future::Ready<()>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&hits);
        (hits, move |_ctx: Arc<Context>| {
            c.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        })
    }

    #[tokio::test]
    async fn test_matched_handler_runs() {
        let (hits, handler) = counter();
        let mut router = Router::new();
        router.handle("/start", handler);
        let (dispatcher, seen) = dispatcher(router);

        dispatcher.process(message(Some("/start:x"), vec![])).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_reported_once() {
        let mut router = Router::new();
        router.handle("/fail", |_ctx: Arc<Context>| async { Err::<(), _>("broken") });
        let (dispatcher, seen) = dispatcher(router);

        dispatcher.process(message(Some("/fail"), vec![])).await;

        assert_eq!(
            *seen.lock(),
            [Reported {
                panic: false,
                endpoint: Some("/fail".into()),
                with_context: true,
            }]
        );
    }

    fn explode() {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (hits, handler) = counter();
        let mut router = Router::new();
        router
            .handle(Endpoint::ANY_CALLBACK, |_ctx: Arc<Context>| async { explode() })
            .handle(Endpoint::TEXT, handler);
        let (dispatcher, seen) = dispatcher(router);

        dispatcher.process(callback("boom")).await;
        dispatcher.process(message(Some("still alive"), vec![])).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].panic && seen[0].with_context);
    }

    #[tokio::test]
    async fn test_unknown_update_skips_middleware() {
        let (hits, _) = counter();
        let pre_hits = Arc::clone(&hits);
        let mut router = Router::new();
        router.pre(Middleware::from_fn(move |ctx, next| {
            pre_hits.fetch_add(1, Ordering::SeqCst);
            next.call(ctx)
        }));
        let (dispatcher, seen) = dispatcher(router);

        dispatcher
            .process(Update::Unknown(UnknownUpdate {
                update_type: "from_the_future".into(),
                timestamp: 1,
            }))
            .await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pre_middleware_runs_without_match() {
        let (hits, _) = counter();
        let (use_hits, _) = counter();
        let pre_hits = Arc::clone(&hits);
        let use_counter = Arc::clone(&use_hits);
        let mut router = Router::new();
        router
            .pre(Middleware::from_fn(move |ctx, next| {
                pre_hits.fetch_add(1, Ordering::SeqCst);
                next.call(ctx)
            }))
            .use_middleware(Middleware::from_fn(move |ctx, next| {
                use_counter.fetch_add(1, Ordering::SeqCst);
                next.call(ctx)
            }));
        let (dispatcher, seen) = dispatcher(router);

        dispatcher.process(message(Some("nobody listens"), vec![])).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(use_hits.load(Ordering::SeqCst), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_full_chain_order_for_grouped_handler() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let layer = |name: &'static str| {
            let log = Arc::clone(&log);
            Middleware::from_fn(move |ctx, next| {
                log.lock().push(name);
                next.call(ctx)
            })
        };

        let mut router = Router::new();
        router.pre(layer("pre")).use_middleware(layer("use"));
        router.handle("/start", |_ctx: Arc<Context>| async {
            Err::<(), _>("root handler must not run")
        });
        let handler_log = Arc::clone(&log);
        router.group().use_middleware(layer("group")).handle_with(
            "/start",
            move |_ctx: Arc<Context>| {
                handler_log.lock().push("handler");
                async {}
            },
            [layer("own")],
        );
        let (dispatcher, seen) = dispatcher(router);

        dispatcher.process(message(Some("/start"), vec![])).await;

        assert_eq!(*log.lock(), ["pre", "use", "group", "own", "handler"]);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_waits_for_in_flight_tasks() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        let mut router = Router::new();
        router.handle(Endpoint::TEXT, move |_ctx: Arc<Context>| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let (dispatcher, _) = dispatcher(router);

        let (tx, rx) = mpsc::channel(8);
        for i in 0..5 {
            tx.send(message(Some(&format!("m{i}")), vec![]))
                .await
                .unwrap();
        }
        drop(tx);

        dispatcher.run(rx).await;

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_context_sees_cancellation() {
        let token = CancellationToken::new();
        let mut router = Router::new();
        router.handle(Endpoint::TEXT, |ctx: Arc<Context>| async move {
            if ctx.cancellation().is_cancelled() {
                Err::<(), _>("cancelled")
            } else {
                Ok(())
            }
        });
        let (dispatcher, seen) = dispatcher(router);
        let dispatcher = dispatcher.with_cancellation(token.clone());

        token.cancel();
        dispatcher.process(message(Some("hi"), vec![])).await;

        assert_eq!(seen.lock().len(), 1);
    }
}
