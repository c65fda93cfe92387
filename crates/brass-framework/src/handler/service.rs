//! Tower integration for handlers.
//!
//! [`HandlerService`] wraps a [`BoxedHandler`] and implements
//! `tower::Service<Arc<Context>>`, so any tower [`Layer`](tower::Layer) whose
//! service keeps that request type can be stacked on a handler. See
//! [`Middleware::from_layer`](crate::Middleware::from_layer) for the reverse
//! direction.

use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::future::BoxFuture;
use tower::{BoxError, Service};

use super::BoxedHandler;
use crate::context::Context;

/// A tower [`Service`] that calls a boxed handler.
#[derive(Clone, Debug)]
pub struct HandlerService {
    handler: BoxedHandler,
}

impl HandlerService {
    pub fn new(handler: BoxedHandler) -> Self {
        Self { handler }
    }

    pub fn into_inner(self) -> BoxedHandler {
        self.handler
    }
}

impl From<BoxedHandler> for HandlerService {
    fn from(handler: BoxedHandler) -> Self {
        HandlerService::new(handler)
    }
}

impl Service<Arc<Context>> for HandlerService {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        self.handler.call(ctx)
    }
}
