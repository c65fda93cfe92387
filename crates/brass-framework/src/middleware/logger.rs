//! Request logging middleware.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::{Middleware, Skipper, default_skipper};
use crate::context::Context;
use crate::handler::BoxedHandler;

/// Configuration for [`logger_with_config`].
#[derive(Clone)]
pub struct LoggerConfig {
    pub skipper: Skipper,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            skipper: default_skipper(),
        }
    }
}

impl std::fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerConfig").finish_non_exhaustive()
    }
}

/// Logs one line per update with its type, sender, chat, elapsed time and
/// the error, if any. The chain's result is returned unchanged.
pub fn logger() -> Middleware {
    logger_with_config(LoggerConfig::default())
}

/// [`logger`] with explicit configuration.
pub fn logger_with_config(config: LoggerConfig) -> Middleware {
    let skipper = config.skipper;
    Middleware::new(move |next: BoxedHandler| {
        let skipper = Arc::clone(&skipper);
        BoxedHandler::new(move |ctx: Arc<Context>| {
            let skipper = Arc::clone(&skipper);
            let next = next.clone();
            async move {
                if skipper(&ctx) {
                    return next.call(ctx).await;
                }

                let start = Instant::now();
                let result = next.call(Arc::clone(&ctx)).await;
                let elapsed = start.elapsed();

                let update_type = ctx.update().type_tag();
                let sender = ctx.sender().map(|u| u.user_id).unwrap_or_default();
                let chat = ctx.chat();
                match &result {
                    Ok(()) => info!(update_type, sender, chat, ?elapsed, "Update handled"),
                    Err(error) => {
                        warn!(update_type, sender, chat, ?elapsed, %error, "Update failed")
                    }
                }
                result
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::tests::message;
    use crate::middleware::compose;
    use crate::testing::context_for;

    #[tokio::test]
    async fn test_logger_passes_result_through() {
        let ctx = Arc::new(context_for(message(Some("hi"), vec![])).0);

        let ok = compose(BoxedHandler::noop(), &[logger()]);
        assert!(ok.call(Arc::clone(&ctx)).await.is_ok());

        let failing = BoxedHandler::new(|_ctx| async { Err::<(), _>("bad") });
        let err = compose(failing, &[logger()]).call(ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "bad");
    }

    #[tokio::test]
    async fn test_skipped_logger_still_calls_next() {
        let config = LoggerConfig {
            skipper: Arc::new(|_ctx: &Context| true),
        };
        let ctx = Arc::new(context_for(message(Some("hi"), vec![])).0);
        let failing = BoxedHandler::new(|_ctx| async { Err::<(), _>("bad") });

        let result = compose(failing, &[logger_with_config(config)]).call(ctx).await;
        assert!(result.is_err());
    }
}
