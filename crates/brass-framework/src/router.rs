//! Handler registry and lookup.
//!
//! A [`Router`] holds a root registry and any number of isolated [`Group`]s.
//! Every registry maps an [`Endpoint`] to one [`HandlerEntry`]; registering
//! the same endpoint twice replaces the earlier entry.
//!
//! Lookup for an update resolved to endpoint `E`:
//!
//! 1. `E` in each group, in creation order;
//! 2. `E` in the root registry;
//! 3. a fallback chain that depends on the update shape:
//!    - a created message with an attachment endpoint tries
//!      [`Endpoint::TEXT`] (only when the message has text), then
//!      [`Endpoint::MESSAGE`];
//!    - any other created message tries [`Endpoint::TEXT`] then
//!      [`Endpoint::MESSAGE`], skipping steps equal to `E`;
//!    - a callback tries [`Endpoint::ANY_CALLBACK`].
//!
//! Each fallback step again searches the groups before the root registry.
//!
//! ```rust,ignore
//! let mut router = Router::new();
//! router
//!     .use_middleware(middleware::logger())
//!     .handle("/start", start)
//!     .handle(Endpoint::TEXT, echo);
//!
//! router
//!     .group()
//!     .use_middleware(middleware::whitelist([ADMIN_ID]))
//!     .handle("/ban", ban);
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use brass_core::Update;

use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::handler::{BoxedHandler, IntoHandlerResult};
use crate::middleware::{Middleware, compose};

// ============================================================================
// HandlerEntry
// ============================================================================

/// A registered handler with its per-registration middleware.
#[derive(Clone, Debug)]
pub struct HandlerEntry {
    pub handler: BoxedHandler,
    pub middleware: Vec<Middleware>,
}

impl HandlerEntry {
    pub fn new(handler: BoxedHandler, middleware: Vec<Middleware>) -> Self {
        Self {
            handler,
            middleware,
        }
    }
}

// ============================================================================
// Group
// ============================================================================

/// An isolated registry with its own middleware.
#[derive(Clone, Debug, Default)]
pub struct Group {
    middleware: Vec<Middleware>,
    handlers: HashMap<Endpoint, HandlerEntry>,
}

impl Group {
    /// Appends middleware run for every handler of this group.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Registers `handler` for `endpoint`.
    pub fn handle<F, Fut>(&mut self, endpoint: impl Into<Endpoint>, handler: F) -> &mut Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.handle_boxed(endpoint, BoxedHandler::new(handler), Vec::new())
    }

    /// Registers `handler` for `endpoint` with per-handler middleware.
    pub fn handle_with<F, Fut>(
        &mut self,
        endpoint: impl Into<Endpoint>,
        handler: F,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &mut Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.handle_boxed(
            endpoint,
            BoxedHandler::new(handler),
            middleware.into_iter().collect(),
        )
    }

    /// Registers an already boxed handler.
    pub fn handle_boxed(
        &mut self,
        endpoint: impl Into<Endpoint>,
        handler: BoxedHandler,
        middleware: Vec<Middleware>,
    ) -> &mut Self {
        self.handlers
            .insert(endpoint.into(), HandlerEntry::new(handler, middleware));
        self
    }

    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    pub fn get(&self, endpoint: &Endpoint) -> Option<&HandlerEntry> {
        self.handlers.get(endpoint)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ============================================================================
// Route
// ============================================================================

/// The outcome of a successful lookup.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    /// The endpoint the entry is registered under, which differs from the
    /// resolved endpoint after a fallback.
    pub matched: &'a Endpoint,
    pub entry: &'a HandlerEntry,
    /// Middleware of the owning group, empty for root entries.
    pub group_middleware: &'a [Middleware],
}

impl Route<'_> {
    /// Builds the chain below the pre-middleware: `use` middleware, group
    /// middleware, per-handler middleware, then the handler.
    pub fn chain(&self, use_middleware: &[Middleware]) -> BoxedHandler {
        let handler = compose(self.entry.handler.clone(), &self.entry.middleware);
        let handler = compose(handler, self.group_middleware);
        compose(handler, use_middleware)
    }
}

// ============================================================================
// Router
// ============================================================================

/// The root registry, its groups and the global middleware lists.
#[derive(Clone, Debug, Default)]
pub struct Router {
    pre: Vec<Middleware>,
    middleware: Vec<Middleware>,
    handlers: HashMap<Endpoint, HandlerEntry>,
    groups: Vec<Group>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends middleware that runs for every update before lookup, whether
    /// or not a handler matches.
    pub fn pre(&mut self, middleware: Middleware) -> &mut Self {
        self.pre.push(middleware);
        self
    }

    /// Appends middleware that runs for every matched update.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Registers `handler` for `endpoint` in the root registry.
    pub fn handle<F, Fut>(&mut self, endpoint: impl Into<Endpoint>, handler: F) -> &mut Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.handle_boxed(endpoint, BoxedHandler::new(handler), Vec::new())
    }

    /// Registers `handler` for `endpoint` with per-handler middleware.
    pub fn handle_with<F, Fut>(
        &mut self,
        endpoint: impl Into<Endpoint>,
        handler: F,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &mut Self
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.handle_boxed(
            endpoint,
            BoxedHandler::new(handler),
            middleware.into_iter().collect(),
        )
    }

    /// Registers an already boxed handler in the root registry.
    pub fn handle_boxed(
        &mut self,
        endpoint: impl Into<Endpoint>,
        handler: BoxedHandler,
        middleware: Vec<Middleware>,
    ) -> &mut Self {
        self.handlers
            .insert(endpoint.into(), HandlerEntry::new(handler, middleware));
        self
    }

    /// Creates a new group. Groups are searched in creation order.
    pub fn group(&mut self) -> &mut Group {
        self.groups.push(Group::default());
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    pub fn pre_middleware(&self) -> &[Middleware] {
        &self.pre
    }

    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Finds the entry for `endpoint`, following the fallback chain for
    /// `update`.
    pub fn find(&self, endpoint: &Endpoint, update: &Update) -> Option<Route<'_>> {
        if endpoint.is_empty() {
            return None;
        }
        if let Some(route) = self.lookup(endpoint) {
            return Some(route);
        }

        match update {
            Update::MessageCreated(created) => {
                if endpoint.is_attachment() {
                    if created.message.body.text.is_some()
                        && let Some(route) = self.lookup(&Endpoint::TEXT)
                    {
                        return Some(route);
                    }
                    return self.lookup(&Endpoint::MESSAGE);
                }
                if *endpoint != Endpoint::TEXT
                    && *endpoint != Endpoint::MESSAGE
                    && let Some(route) = self.lookup(&Endpoint::TEXT)
                {
                    return Some(route);
                }
                if *endpoint != Endpoint::MESSAGE {
                    return self.lookup(&Endpoint::MESSAGE);
                }
                None
            }
            Update::MessageCallback(_) if *endpoint != Endpoint::ANY_CALLBACK => {
                self.lookup(&Endpoint::ANY_CALLBACK)
            }
            _ => None,
        }
    }

    fn lookup(&self, endpoint: &Endpoint) -> Option<Route<'_>> {
        self.groups
            .iter()
            .find_map(|group| {
                group
                    .handlers
                    .get_key_value(endpoint)
                    .map(|(matched, entry)| Route {
                        matched,
                        entry,
                        group_middleware: &group.middleware,
                    })
            })
            .or_else(|| {
                self.handlers
                    .get_key_value(endpoint)
                    .map(|(matched, entry)| Route {
                        matched,
                        entry,
                        group_middleware: &[],
                    })
            })
    }
}
