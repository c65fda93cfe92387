//! # Brass
//!
//! An event-dispatch framework for chat bots that receive updates by long
//! polling.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  queue  ┌────────────┐     ┌──────────────────────────────────────────┐
//! │  Poller  │────────▶│ Dispatcher │────▶│ update #1 (own task, own context)        │──▶ client
//! │ (client) │         │            │────▶│ update #2 (own task, own context)        │──▶ client
//! └──────────┘         └────────────┘────▶│ ...                                      │
//!                                         └──────────────────────────────────────────┘
//! ```
//!
//! - **Poller**: Long-polls the platform, decodes updates and backs off on errors
//! - **Dispatcher**: Resolves each update to an endpoint and runs it in its own task
//! - **Router**: Maps endpoints to handlers, with groups and fallback lookup
//! - **Middleware**: Wraps handlers; pre-middleware runs before lookup
//! - **Context**: Per-update data, a local store and retried platform calls
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brass::prelude::*;
//!
//! async fn echo(ctx: Arc<Context>) -> ContextResult<()> {
//!     ctx.reply(ctx.text(), SendOptions::new()).await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut bot = Bot::new(client);
//!     bot.use_middleware(middleware::recover())
//!         .handle(Endpoint::TEXT, echo);
//!
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use brass_core as core;
pub use brass_framework as framework;
pub use brass_runtime as runtime;

/// Prelude module for convenient imports.
///
/// This module provides all commonly used types for building bot applications:
///
/// ```rust,ignore
/// use brass::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use brass_runtime::{Bot, BotStatus, BrassConfig, ConfigLoader, LongPoller, Poller};

    // Routing and handlers
    pub use brass_framework::{
        BotError, Context, ContextError, ContextResult, Endpoint, Group, HandlerResult,
        Middleware, Router, SendOptions, middleware,
    };

    // Platform contract - for client implementations
    pub use brass_core::{
        ApiError, ApiResult, BoxedClient, CancellationToken, PlatformClient, RetryPolicy, Update,
    };
}
