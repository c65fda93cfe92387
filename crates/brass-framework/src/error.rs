//! Error types for the Brass framework.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

use brass_core::ApiError;
use thiserror::Error;

use crate::endpoint::Endpoint;

pub use tower::BoxError;

/// What a handler or middleware returns.
pub type HandlerResult = Result<(), BoxError>;

/// A terminal failure while processing one update.
///
/// Both kinds are delivered to the bot's error sink; neither ever affects
/// other updates.
#[derive(Debug, Error)]
pub enum BotError {
    /// The handler chain returned an error.
    #[error("handler for '{endpoint}' failed: {source}")]
    Handler {
        /// Endpoint the update resolved to.
        endpoint: Endpoint,
        #[source]
        source: BoxError,
    },

    /// Code inside the dispatch boundary panicked.
    #[error("panic recovered: {message}")]
    Panic {
        /// The panic payload rendered as text.
        message: String,
        /// Stack of the panicking thread at the panic site, as recorded by
        /// [`install_panic_hook`]. Without the hook, the stack where the
        /// panic was caught.
        backtrace: String,
    },
}

impl BotError {
    /// Creates a handler error.
    pub fn handler(endpoint: Endpoint, source: impl Into<BoxError>) -> Self {
        Self::Handler {
            endpoint,
            source: source.into(),
        }
    }

    /// Creates a panic error from a caught panic payload.
    pub fn panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panic {
            message: panic_message(payload),
            backtrace: take_panic_backtrace(),
        }
    }

    /// Endpoint of a handler error.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Handler { endpoint, .. } => Some(endpoint),
            Self::Panic { .. } => None,
        }
    }

    /// Returns `true` for [`BotError::Panic`].
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic { .. })
    }
}

// ============================================================================
// Panic backtraces
// ============================================================================

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Installs, once per process, a panic hook that records the backtrace of
/// every panic for the panicking thread before running the previous hook.
///
/// Futures are polled inside `catch_unwind` on the thread that panics, so
/// [`take_panic_backtrace`] at the catch point reads the trace of the panic
/// just caught.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Takes the backtrace recorded for the latest panic on this thread.
///
/// Falls back to the current stack when no hook recorded one.
pub fn take_panic_backtrace() -> String {
    PANIC_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

/// Renders a panic payload the way the default panic hook does.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

/// Errors returned by [`Context`](crate::Context) operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The update carries no chat to send to.
    #[error("no chat id available for this update")]
    NoChatId,

    /// The update carries no message to act on.
    #[error("no message available for this update")]
    NoMessage,

    /// The update is not a callback.
    #[error("no callback available for this update")]
    NoCallback,

    /// The platform call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ContextError {
    /// Returns `true` when the operation is impossible for this update shape,
    /// as opposed to a platform or transport failure.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, Self::Api(_))
    }
}

/// Result type for context operations.
pub type ContextResult<T> = Result<T, ContextError>;
