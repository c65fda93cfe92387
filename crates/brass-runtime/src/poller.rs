//! Update acquisition.
//!
//! A [`Poller`] fetches raw updates through the [`PlatformClient`], decodes
//! them and feeds them into the bounded queue read by the dispatcher. It owns
//! the queue's sender and drops it when it exits, which closes the queue
//! exactly once.
//!
//! [`LongPoller`] is the default: one outstanding long-poll request at a
//! time, exponential backoff on failure.
//!
//! ```text
//! running ──fetch error──▶ backing off ──wait──▶ running
//!    │                          │
//!    └────── stop / queue closed ──────▶ stopped (queue closed)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use brass_core::{BoxedClient, GetUpdatesOptions, PlatformClient, Update};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::PollingConfig;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_LIMIT: u32 = 100;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Source of updates for a bot.
#[async_trait]
pub trait Poller: Send + Sync {
    /// Feeds updates into `tx` until `cancel` fires or the receiver is
    /// dropped. Implementations must drop `tx` on return.
    async fn poll(&self, client: BoxedClient, tx: mpsc::Sender<Update>, cancel: CancellationToken);
}

/// Long-polling [`Poller`] with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPoller {
    timeout: Duration,
    limit: u32,
    update_types: Vec<String>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for LongPoller {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            limit: DEFAULT_POLL_LIMIT,
            update_types: Vec::new(),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl LongPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new()
            .with_timeout(config.timeout())
            .with_limit(config.limit)
            .with_update_types(config.update_types.iter().cloned())
            .with_backoff(config.initial_backoff(), config.max_backoff())
    }

    /// Long-poll timeout passed to the platform.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum updates per batch.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts fetching to these update type tags; empty means all.
    pub fn with_update_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// First wait after a failure, and the cap the doubling stops at.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    fn options(&self, marker: Option<i64>) -> GetUpdatesOptions {
        GetUpdatesOptions {
            timeout: self.timeout,
            marker,
            types: self.update_types.clone(),
            limit: self.limit,
        }
    }

    /// Decodes a batch and forwards it. Returns `false` once the loop must
    /// end.
    async fn forward(
        &self,
        raw: Vec<serde_json::Value>,
        tx: &mpsc::Sender<Update>,
        cancel: &CancellationToken,
    ) -> bool {
        for value in raw {
            let update = match Update::from_value(value) {
                Ok(Update::Unknown(unknown)) => {
                    trace!(update_type = %unknown.update_type, "Skipping unknown update type");
                    continue;
                }
                Ok(update) => update,
                Err(e) => {
                    warn!(error = %e, "Failed to decode update, skipping");
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                sent = tx.send(update) => {
                    if sent.is_err() {
                        debug!("Update queue receiver dropped");
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[async_trait]
impl Poller for LongPoller {
    async fn poll(&self, client: BoxedClient, tx: mpsc::Sender<Update>, cancel: CancellationToken) {
        info!(
            timeout = ?self.timeout,
            limit = self.limit,
            types = ?self.update_types,
            "Poller started"
        );

        let mut marker: Option<i64> = None;
        let mut backoff = self.initial_backoff;

        while !cancel.is_cancelled() {
            let options = self.options(marker);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = client.get_updates(&cancel, &options) => result,
            };

            match result {
                Ok(batch) => {
                    backoff = self.initial_backoff;
                    trace!(count = batch.updates.len(), marker = ?batch.marker, "Fetched updates");
                    if !self.forward(batch.updates, &tx, &cancel).await {
                        break;
                    }
                    if batch.marker.is_some() {
                        marker = batch.marker;
                    }
                }
                Err(e) if e.is_cancelled() || cancel.is_cancelled() => break,
                Err(e) => {
                    warn!(error = %e, retry_in = ?backoff, "Failed to fetch updates");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }

        drop(tx);
        info!("Poller stopped");
    }
}
