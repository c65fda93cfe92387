//! Bot lifecycle.
//!
//! A [`Bot`] owns the platform client, the [`Router`] being built and the
//! [`Poller`]. Registration takes `&mut self`; [`Bot::start`] snapshots the
//! router, so the dispatcher works on an immutable copy and registration
//! during dispatch is impossible.
//!
//! ```rust,ignore
//! let mut bot = Bot::new(client);
//! bot.use_middleware(middleware::recover())
//!     .handle("/start", start)
//!     .handle(Endpoint::TEXT, echo);
//!
//! bot.run().await?; // until Ctrl+C / SIGTERM
//! ```

use std::future::Future;
use std::sync::Arc;

use brass_core::{BoxedClient, RetryPolicy};
use brass_framework::{
    BotError, Context, Dispatcher, Endpoint, ErrorSink, Group, IntoHandlerResult, Middleware,
    Router,
};
use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{BrassConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poller::{LongPoller, Poller};

/// Default capacity of the queue between poller and dispatcher.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Lifecycle state of a [`Bot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotStatus {
    /// Not started yet; handlers may still be registered.
    Idle,
    Running,
    /// Stop requested, tasks still draining.
    Stopping,
    Stopped,
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// How the poll and dispatch tasks ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Clean,
    PollerPanicked(String),
    DispatcherPanicked(String),
}

/// A bot: client, routes and the poll/dispatch pipeline.
pub struct Bot {
    client: BoxedClient,
    router: Router,
    poller: Arc<dyn Poller>,
    retry: Arc<RetryPolicy>,
    queue_capacity: usize,
    on_error: Option<ErrorSink>,
    cancel: CancellationToken,
    status: Arc<Mutex<BotStatus>>,
    /// Set once the tasks have finished; every `wait` observes it.
    done: watch::Sender<Option<Outcome>>,
}

impl Bot {
    pub fn new(client: BoxedClient) -> Self {
        Self {
            client,
            router: Router::new(),
            poller: Arc::new(LongPoller::new()),
            retry: Arc::new(RetryPolicy::default()),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            on_error: None,
            cancel: CancellationToken::new(),
            status: Arc::new(Mutex::new(BotStatus::Idle)),
            done: watch::Sender::new(None),
        }
    }

    /// Validates `config`, initializes logging from it and builds a bot with
    /// its polling, retry and dispatch settings.
    pub fn from_config(client: BoxedClient, config: &BrassConfig) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        Ok(Self::new(client)
            .with_poller(LongPoller::from_config(&config.polling))
            .with_retry_policy(config.retry.to_policy())
            .with_queue_capacity(config.dispatch.queue_capacity))
    }

    pub fn with_poller(mut self, poller: impl Poller + 'static) -> Self {
        self.poller = Arc::new(poller);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Arc::new(policy);
        self
    }

    /// Capacity of the update queue; a full queue holds back the poller.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    // ─── Registration ─────────────────────────────────────────────────────────

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Registers `handler` for `endpoint`. See [`Router::handle`].
    pub fn handle<F, Fut>(&mut self, endpoint: impl Into<Endpoint>, handler: F) -> &mut Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.router.handle(endpoint, handler);
        self
    }

    /// Registers `handler` with per-handler middleware.
    pub fn handle_with<F, Fut>(
        &mut self,
        endpoint: impl Into<Endpoint>,
        handler: F,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &mut Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.router.handle_with(endpoint, handler, middleware);
        self
    }

    /// Adds middleware run before lookup for every update.
    pub fn pre(&mut self, middleware: Middleware) -> &mut Self {
        self.router.pre(middleware);
        self
    }

    /// Adds middleware run for every matched update.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.router.use_middleware(middleware);
        self
    }

    pub fn group(&mut self) -> &mut Group {
        self.router.group()
    }

    /// Replaces the error sink. Without one, errors are logged.
    pub fn on_error<F>(&mut self, sink: F) -> &mut Self
    where
        F: Fn(&BotError, Option<&Context>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(sink));
        self
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────────

    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    pub fn status(&self) -> BotStatus {
        *self.status.lock()
    }

    /// Token cancelled by [`stop`](Self::stop); every context carries it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns the poller and the dispatcher on the current runtime.
    ///
    /// Fails with [`RuntimeError::AlreadyStarted`] unless the bot is idle.
    pub fn start(&self) -> RuntimeResult<()> {
        {
            let mut status = self.status.lock();
            if *status != BotStatus::Idle {
                return Err(RuntimeError::AlreadyStarted);
            }
            *status = BotStatus::Running;
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let mut dispatcher = Dispatcher::new(self.router.clone(), Arc::clone(&self.client))
            .with_retry_policy(Arc::clone(&self.retry))
            .with_cancellation(self.cancel.clone());
        if let Some(sink) = &self.on_error {
            dispatcher = dispatcher.with_error_sink(Arc::clone(sink));
        }

        let poller = Arc::clone(&self.poller);
        let client = Arc::clone(&self.client);
        let cancel = self.cancel.clone();
        let poller_task = tokio::spawn(async move { poller.poll(client, tx, cancel).await });
        let dispatcher_task = tokio::spawn(async move { dispatcher.run(rx).await });

        let status = Arc::clone(&self.status);
        let done = self.done.clone();
        tokio::spawn(async move {
            let poller = poller_task.await;
            let dispatcher = dispatcher_task.await;
            let outcome = match (poller, dispatcher) {
                (Err(e), _) => Outcome::PollerPanicked(e.to_string()),
                (_, Err(e)) => Outcome::DispatcherPanicked(e.to_string()),
                (Ok(()), Ok(())) => Outcome::Clean,
            };
            *status.lock() = BotStatus::Stopped;
            info!("Bot stopped");
            done.send_replace(Some(outcome));
        });

        info!(queue_capacity = self.queue_capacity, "Bot started");
        Ok(())
    }

    /// Requests shutdown: stops intake and cancels the shared token.
    /// Idempotent.
    pub fn stop(&self) {
        let mut status = self.status.lock();
        match *status {
            BotStatus::Running => *status = BotStatus::Stopping,
            BotStatus::Idle => {
                *status = BotStatus::Stopped;
                self.done.send_replace(Some(Outcome::Clean));
            }
            BotStatus::Stopping | BotStatus::Stopped => {}
        }
        drop(status);

        if !self.cancel.is_cancelled() {
            debug!("Stop requested");
            self.cancel.cancel();
        }
    }

    /// Waits until the poller has closed the queue and every in-flight
    /// update has finished. Returns immediately if the bot never started.
    ///
    /// Any number of callers may wait at once, and a dropped `wait` does not
    /// affect the others.
    pub async fn wait(&self) -> RuntimeResult<()> {
        if self.status() == BotStatus::Idle {
            return Ok(());
        }

        let mut rx = self.done.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map(|outcome| Option::clone(&outcome));

        match outcome {
            Ok(Some(Outcome::PollerPanicked(msg))) => Err(RuntimeError::PollerPanicked(msg)),
            Ok(Some(Outcome::DispatcherPanicked(msg))) => {
                Err(RuntimeError::DispatcherPanicked(msg))
            }
            _ => Ok(()),
        }
    }

    /// [`stop`](Self::stop) followed by [`wait`](Self::wait).
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        self.stop();
        self.wait().await
    }

    /// Starts the bot and runs until Ctrl+C or SIGTERM, then shuts down
    /// gracefully.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start()?;
        let signalled = wait_for_shutdown_signal().await;
        self.shutdown().await?;
        signalled
    }

    /// Starts the bot and runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        shutdown.await;
        self.shutdown().await
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("status", &self.status())
            .field("queue_capacity", &self.queue_capacity)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_shutdown_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brass_core::{
        ApiError, ApiResult, GetUpdatesOptions, PlatformClient, UpdateList,
    };
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves one batch per scripted entry, then long-polls until cancelled.
    #[derive(Default)]
    struct MockClient {
        batches: Mutex<VecDeque<Vec<serde_json::Value>>>,
    }

    impl MockClient {
        fn with_batches(batches: Vec<Vec<serde_json::Value>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
            })
        }
    }

    #[async_trait]
    impl PlatformClient for MockClient {
        async fn get_updates(
            &self,
            cancel: &CancellationToken,
            _options: &GetUpdatesOptions,
        ) -> ApiResult<UpdateList> {
            let next = self.batches.lock().pop_front();
            match next {
                Some(updates) => Ok(UpdateList {
                    updates,
                    marker: None,
                }),
                None => {
                    cancel.cancelled().await;
                    Err(ApiError::Cancelled)
                }
            }
        }
    }

    fn text(text: &str) -> serde_json::Value {
        json!({
            "update_type": "message_created",
            "timestamp": 1,
            "message": {
                "sender": { "user_id": 3 },
                "recipient": { "chat_id": 9 },
                "body": { "mid": "m1", "text": text }
            }
        })
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let bot = Bot::new(MockClient::with_batches(vec![]));
        bot.start().unwrap();
        assert!(matches!(bot.start(), Err(RuntimeError::AlreadyStarted)));
        bot.shutdown().await.unwrap();
        assert!(matches!(bot.start(), Err(RuntimeError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let bot = Bot::new(MockClient::with_batches(vec![]));
        bot.start().unwrap();
        let token = bot.cancellation_token();

        bot.stop();
        bot.stop();
        assert!(token.is_cancelled());
        assert_eq!(bot.status(), BotStatus::Stopping);

        tokio::time::timeout(Duration::from_secs(5), bot.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bot.status(), BotStatus::Stopped);
        bot.stop();
        bot.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_to_end_dispatch() {
        let client = MockClient::with_batches(vec![
            vec![text("/start"), text("hello")],
            vec![text("again")],
        ]);
        let mut bot = Bot::new(client);

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<String>();
        let commands = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&commands);
        bot.handle("/start", move |_ctx: Arc<Context>| {
            seen.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .handle(Endpoint::TEXT, move |ctx: Arc<Context>| {
            let done_tx = done_tx.clone();
            async move {
                let _ = done_tx.send(ctx.text().to_owned());
            }
        });

        bot.start().unwrap();
        let mut texts = vec![
            done_rx.recv().await.unwrap(),
            done_rx.recv().await.unwrap(),
        ];
        bot.shutdown().await.unwrap();

        texts.sort();
        assert_eq!(texts, ["again", "hello"]);
        assert_eq!(commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_errors_reach_sink() {
        let client = MockClient::with_batches(vec![vec![text("/fail")]]);
        let mut bot = Bot::new(client);

        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<(String, bool)>();
        bot.handle("/fail", |_ctx: Arc<Context>| async {
            Err::<(), _>("handler failed")
        })
        .on_error(move |err, ctx| {
            let endpoint = err.endpoint().map(ToString::to_string).unwrap_or_default();
            let _ = err_tx.send((endpoint, ctx.is_some()));
        });

        bot.start().unwrap();
        let reported = err_rx.recv().await.unwrap();
        bot.shutdown().await.unwrap();

        assert_eq!(reported, ("/fail".to_owned(), true));
    }

    /// A bot whose text handler signals when it starts, then works for
    /// 300ms before setting the returned flag.
    fn slow_bot() -> (Bot, mpsc::UnboundedReceiver<()>, Arc<AtomicBool>) {
        let mut bot = Bot::new(MockClient::with_batches(vec![vec![text("slow")]]));
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        bot.handle(Endpoint::TEXT, move |_ctx: Arc<Context>| {
            let started_tx = started_tx.clone();
            let flag = Arc::clone(&flag);
            async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_millis(300)).await;
                flag.store(true, Ordering::SeqCst);
            }
        });
        (bot, started_rx, finished)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_shutdowns_both_wait_for_handlers() {
        let (bot, mut started, finished) = slow_bot();
        bot.start().unwrap();
        started.recv().await.unwrap();

        let (first, second) = tokio::join!(
            async {
                let result = bot.shutdown().await;
                (result, finished.load(Ordering::SeqCst))
            },
            async {
                let result = bot.shutdown().await;
                (result, finished.load(Ordering::SeqCst))
            },
        );

        assert!(matches!(first, (Ok(()), true)));
        assert!(matches!(second, (Ok(()), true)));
        assert_eq!(bot.status(), BotStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_does_not_detach_tasks() {
        let (bot, mut started, finished) = slow_bot();
        bot.start().unwrap();
        started.recv().await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), bot.shutdown()).await;
        assert!(abandoned.is_err());
        assert!(!finished.load(Ordering::SeqCst));

        bot.wait().await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(bot.status(), BotStatus::Stopped);
    }

    #[tokio::test]
    async fn test_run_until() {
        let bot = Bot::new(MockClient::with_batches(vec![vec![text("hi")]]));
        bot.run_until(tokio::time::sleep(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(bot.status(), BotStatus::Stopped);
        assert!(bot.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = BrassConfig::default();
        config.dispatch.queue_capacity = 0;
        let err = Bot::from_config(MockClient::with_batches(vec![]), &config).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_stop_before_start() {
        let bot = Bot::new(MockClient::with_batches(vec![]));
        bot.stop();
        assert_eq!(bot.status(), BotStatus::Stopped);
        assert!(matches!(bot.start(), Err(RuntimeError::AlreadyStarted)));
    }
}
