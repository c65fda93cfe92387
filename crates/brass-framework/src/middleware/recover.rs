//! Panic recovery middleware.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use super::{Middleware, Skipper, default_skipper};
use crate::context::Context;
use crate::error::{BoxError, install_panic_hook, panic_message, take_panic_backtrace};
use crate::handler::BoxedHandler;

/// Default number of bytes of stack trace kept in the error.
pub const DEFAULT_STACK_SIZE: usize = 4 << 10;

/// Configuration for [`recover_with_config`].
#[derive(Clone)]
pub struct RecoverConfig {
    pub skipper: Skipper,
    /// Maximum bytes of stack trace attached to the error.
    pub stack_size: usize,
    /// Whether the stack trace is included in the error.
    pub print_stack: bool,
}

impl Default for RecoverConfig {
    fn default() -> Self {
        Self {
            skipper: default_skipper(),
            stack_size: DEFAULT_STACK_SIZE,
            print_stack: true,
        }
    }
}

impl std::fmt::Debug for RecoverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoverConfig")
            .field("stack_size", &self.stack_size)
            .field("print_stack", &self.print_stack)
            .finish_non_exhaustive()
    }
}

/// Recovers from panics anywhere below it and returns them as errors.
pub fn recover() -> Middleware {
    recover_with_config(RecoverConfig::default())
}

/// [`recover`] with explicit configuration.
pub fn recover_with_config(config: RecoverConfig) -> Middleware {
    install_panic_hook();
    let config = Arc::new(config);
    Middleware::new(move |next: BoxedHandler| {
        let config = Arc::clone(&config);
        BoxedHandler::new(move |ctx: Arc<Context>| {
            let config = Arc::clone(&config);
            let next = next.clone();
            async move {
                if (config.skipper)(&ctx) {
                    return next.call(ctx).await;
                }
                let endpoint = ctx.endpoint().clone();
                match AssertUnwindSafe(next.call(ctx)).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        let trace = take_panic_backtrace();
                        debug!(%endpoint, panic = %message, "Handler panicked");
                        if !config.print_stack {
                            return Err(BoxError::from(format!("panic recovered: {message}")));
                        }
                        let stack = truncate(&trace, config.stack_size);
                        Err(BoxError::from(format!("panic recovered: {message}\n{stack}")))
                    }
                }
            }
        })
    })
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::tests::message;
    use crate::middleware::compose;
    use crate::testing::context_for;

    fn ctx() -> Arc<Context> {
        Arc::new(context_for(message(Some("hi"), vec![])).0)
    }

    #[inline(never)]
    fn explode() {
        panic!("kaboom")
    }

    fn panicking() -> BoxedHandler {
        BoxedHandler::new(|_ctx| async { explode() })
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let chain = compose(panicking(), &[recover()]);
        let err = chain.call(ctx()).await.unwrap_err();
        assert!(err.to_string().starts_with("panic recovered: kaboom\n"));
    }

    #[tokio::test]
    async fn test_stack_is_truncated() {
        let chain = compose(
            panicking(),
            &[recover_with_config(RecoverConfig {
                stack_size: 8,
                ..Default::default()
            })],
        );
        let err = chain.call(ctx()).await.unwrap_err().to_string();
        let stack = err.strip_prefix("panic recovered: kaboom\n").unwrap();
        assert!(!stack.is_empty() && stack.len() <= 8);
    }

    #[tokio::test]
    async fn test_stack_names_the_panic_site() {
        let full_stack = recover_with_config(RecoverConfig {
            stack_size: usize::MAX,
            ..Default::default()
        });
        let err = compose(panicking(), &[full_stack])
            .call(ctx())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("explode"), "{err}");
    }

    #[tokio::test]
    async fn test_without_print_stack_error_has_no_stack() {
        let chain = compose(
            panicking(),
            &[recover_with_config(RecoverConfig {
                print_stack: false,
                ..Default::default()
            })],
        );
        let err = chain.call(ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "panic recovered: kaboom");
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let failing = BoxedHandler::new(|_ctx| async { Err::<(), _>("plain") });
        let err = compose(failing, &[recover()])
            .call(ctx())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "plain");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
