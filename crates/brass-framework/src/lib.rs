//! # Brass Framework
//!
//! Routing and dispatch for Brass bots.
//!
//! This layer provides:
//! - Endpoint resolution: every update maps to one [`Endpoint`] key
//! - [`Router`] with groups and the fallback lookup chain
//! - [`Middleware`] composition and built-in middleware
//! - [`Context`] with per-update data, a local store and retried platform calls
//! - [`Dispatcher`] running one contained task per update
//!
//! The polling loop and bot lifecycle live in `brass-runtime`.

pub mod context;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod router;

#[cfg(test)]
mod testing;

pub use context::{Context, Meta, SendOptions};
pub use dispatcher::{Dispatcher, ErrorSink, default_error_sink};
pub use endpoint::{Endpoint, Resolution, parse_command, resolve};
pub use error::{
    BotError, BoxError, ContextError, ContextResult, HandlerResult, install_panic_hook,
    panic_message, take_panic_backtrace,
};
pub use handler::{BoxedHandler, HandlerService, IntoHandlerResult, into_handler};
pub use middleware::{Middleware, Skipper, compose};
pub use router::{Group, HandlerEntry, Route, Router};
