//! Automatic callback answers.

use std::sync::Arc;

use tracing::debug;

use super::{Middleware, Skipper, default_skipper};
use crate::context::Context;
use crate::handler::BoxedHandler;

/// Configuration for [`auto_respond_with_config`].
#[derive(Clone)]
pub struct AutoRespondConfig {
    pub skipper: Skipper,
}

impl Default for AutoRespondConfig {
    fn default() -> Self {
        Self {
            skipper: default_skipper(),
        }
    }
}

impl std::fmt::Debug for AutoRespondConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoRespondConfig").finish_non_exhaustive()
    }
}

/// Answers every callback with an empty notification once the rest of the
/// chain has finished, so the client stops showing a spinner.
///
/// The answer is sent whether or not the chain failed; its own failure is
/// ignored and the chain's result is returned.
pub fn auto_respond() -> Middleware {
    auto_respond_with_config(AutoRespondConfig::default())
}

/// [`auto_respond`] with explicit configuration.
pub fn auto_respond_with_config(config: AutoRespondConfig) -> Middleware {
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
                let result = next.call(Arc::clone(&ctx)).await;
                if ctx.callback().is_some()
                    && let Err(e) = ctx.respond("").await
                {
                    debug!(error = %e, "Automatic callback answer failed");
                }
                result
            }
        })
    })
}
