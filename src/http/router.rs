//! Registry dispatch: an explicit table from [`RouteKey`] to handler.
//!
//! A [`Router`] is filled during setup through `&mut self` and then handed to
//! the server, after which it can only be read. [`LiveRouter`] is for the rare
//! case of registering while serving: every registration publishes a new
//! copy-on-write snapshot, readers never lock.

use crate::http::dispatch::{Dispatch, Verdict};
use crate::http::handler::{self, SharedHandler};
use crate::http::key::RouteKey;
use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<RouteKey, SharedHandler>,
}

impl Router {
    pub fn new() -> Router {
        Router::default()
    }

    /// Register `f` for `(path, method)`, replacing any handler already there.
    pub fn register<F>(&mut self, path: &str, method: impl AsRef<str>, f: F) -> &mut Self
    where
        F: Fn(&RequestContext, &mut ResponseWriter) + Send + Sync + 'static,
    {
        self.register_handler(path, method, handler::shared(f))
    }

    pub fn register_handler(
        &mut self,
        path: &str,
        method: impl AsRef<str>,
        handler: SharedHandler,
    ) -> &mut Self {
        let key = RouteKey::new(path, method.as_ref());
        debug!(%key, "registering route");

        if self.routes.insert(key, handler).is_some() {
            debug!(path, method = method.as_ref(), "replaced existing route");
        }
        self
    }

    pub fn lookup(&self, path: &str, method: &str) -> Option<&SharedHandler> {
        self.routes.get(&RouteKey::new(path, method))
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.keys()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self
            .routes
            .keys()
            .map(|key| format!("{} {}", key.method(), key.path()))
            .collect();
        routes.sort_unstable();

        f.debug_struct("Router").field("routes", &routes).finish()
    }
}

impl Dispatch for Router {
    fn dispatch(
        &self,
        path: &str,
        method: &str,
        ctx: &RequestContext,
        sink: &mut ResponseWriter,
    ) -> Verdict {
        match self.lookup(path, method) {
            Some(handler) => {
                handler.call(ctx, sink);
                Verdict::Invoked
            }
            None => {
                debug!(path, method, "no route registered");
                Verdict::NotFound
            }
        }
    }
}

/// A [`Router`] that accepts registrations while requests are being served.
pub struct LiveRouter {
    current: ArcSwap<Router>,
}

impl LiveRouter {
    pub fn new(router: Router) -> LiveRouter {
        LiveRouter {
            current: ArcSwap::from_pointee(router),
        }
    }

    pub fn register<F>(&self, path: &str, method: impl AsRef<str>, f: F)
    where
        F: Fn(&RequestContext, &mut ResponseWriter) + Send + Sync + 'static,
    {
        self.register_handler(path, method, handler::shared(f))
    }

    pub fn register_handler(&self, path: &str, method: impl AsRef<str>, handler: SharedHandler) {
        let method = method.as_ref();
        self.current.rcu(|router| {
            let mut next = Router::clone(router);
            next.register_handler(path, method, Arc::clone(&handler));
            next
        });
    }

    /// The routing table as of now; later registrations don't affect it.
    pub fn snapshot(&self) -> Arc<Router> {
        self.current.load_full()
    }
}

impl Default for LiveRouter {
    fn default() -> Self {
        LiveRouter::new(Router::new())
    }
}

impl fmt::Debug for LiveRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveRouter").field(&*self.current.load()).finish()
    }
}

impl Dispatch for LiveRouter {
    fn dispatch(
        &self,
        path: &str,
        method: &str,
        ctx: &RequestContext,
        sink: &mut ResponseWriter,
    ) -> Verdict {
        self.current.load().dispatch(path, method, ctx, sink)
    }
}
