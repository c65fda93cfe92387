//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `start` was called on a bot that was already started or stopped.
    #[error("Bot already started")]
    AlreadyStarted,

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The polling task panicked.
    #[error("Poller task panicked: {0}")]
    PollerPanicked(String),

    /// The dispatch task panicked.
    #[error("Dispatcher task panicked: {0}")]
    DispatcherPanicked(String),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
