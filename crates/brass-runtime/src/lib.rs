//! Brass Runtime - polling and lifecycle for Brass bots.
//!
//! This crate provides:
//! - The [`Poller`] contract and the default [`LongPoller`] with backoff
//! - The [`Bot`] lifecycle: registration, start, graceful stop
//! - Configuration loading (`BrassConfig`, [`ConfigLoader`])
//! - Logging configuration ([`LoggingBuilder`])
//!
//! ```rust,ignore
//! use brass_runtime::{Bot, config::load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let mut bot = Bot::from_config(client, &config)?;
//!     bot.handle("/ping", |ctx| async move { ctx.reply("pong").await });
//!
//!     // Run until Ctrl+C
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;

// Re-exports
pub use bot::{Bot, BotStatus, DEFAULT_QUEUE_CAPACITY, wait_for_shutdown_signal};
pub use config::{
    BrassConfig, ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig,
    PollingConfig, Profile, RetryConfig, load_config, load_config_from_file,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poller::{LongPoller, Poller};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
