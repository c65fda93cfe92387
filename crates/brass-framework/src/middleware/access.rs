//! Sender-based access control.
//!
//! A dropped update ends processing with `Ok(())`; nothing is sent back.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::Middleware;
use crate::context::Context;
use crate::handler::BoxedHandler;

/// Passes only updates whose sender is in `ids`.
///
/// Updates without a sender are dropped.
pub fn whitelist(ids: impl IntoIterator<Item = i64>) -> Middleware {
    let ids: Arc<HashSet<i64>> = Arc::new(ids.into_iter().collect());
    filter(move |sender| sender.is_some_and(|id| ids.contains(&id)))
}

/// Drops updates whose sender is in `ids`.
///
/// Updates without a sender pass.
pub fn blacklist(ids: impl IntoIterator<Item = i64>) -> Middleware {
    let ids: Arc<HashSet<i64>> = Arc::new(ids.into_iter().collect());
    filter(move |sender| sender.is_none_or(|id| !ids.contains(&id)))
}

fn filter<P>(allow: P) -> Middleware
where
    P: Fn(Option<i64>) -> bool + Send + Sync + 'static,
{
    let allow = Arc::new(allow);
    Middleware::new(move |next: BoxedHandler| {
        let allow = Arc::clone(&allow);
        BoxedHandler::new(move |ctx: Arc<Context>| {
            let next = next.clone();
            let sender = ctx.sender().map(|u| u.user_id);
            let pass = allow(sender);
            async move {
                if pass {
                    next.call(ctx).await
                } else {
                    debug!(?sender, "Update dropped by access filter");
                    Ok(())
                }
            }
        })
    })
}
