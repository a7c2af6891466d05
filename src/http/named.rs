//! Name-derived dispatch.
//!
//! The request's path and method are turned into an identifier with
//! [`derive_identifier`] (`/pagetwo` + `POST` -> `Pagetwo_POST`) and resolved
//! among the handler methods a holder type exports. Exports are generated by
//! [`handler_set`](crate::handler_set) from the `pub` methods of an `impl`
//! block and collected into a table once, when the dispatcher is built.

use crate::http::dispatch::{Dispatch, Verdict};
use crate::http::key::derive_identifier;
use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A handler method on holder `H`.
pub type NamedHandler<H> = fn(&H, &RequestContext, &mut ResponseWriter);

/// A value whose public handler methods can be reached by name.
///
/// Normally implemented by `#[handler_set]`; only methods listed by
/// [`exports`](HandlerHolder::exports) are ever dispatched to.
pub trait HandlerHolder: Sized + Send + Sync + 'static {
    fn exports() -> Vec<(&'static str, NamedHandler<Self>)>;
}

pub struct NameDispatcher<H> {
    holder: Arc<H>,
    table: HashMap<&'static str, NamedHandler<H>>,
}

impl<H: HandlerHolder> NameDispatcher<H> {
    pub fn new(holder: H) -> NameDispatcher<H> {
        Self::from_shared(Arc::new(holder))
    }

    pub fn from_shared(holder: Arc<H>) -> NameDispatcher<H> {
        let table: HashMap<_, _> = H::exports().into_iter().collect();
        debug!(handlers = table.len(), "built name dispatch table");
        NameDispatcher { holder, table }
    }

    pub fn resolve(&self, path: &str, method: &str) -> Option<NamedHandler<H>> {
        self.table.get(derive_identifier(path, method).as_str()).copied()
    }

    /// Names of every reachable handler, sorted.
    pub fn identifiers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn holder(&self) -> &H {
        &self.holder
    }
}

impl<H> fmt::Debug for NameDispatcher<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameDispatcher")
            .field("handlers", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<H: HandlerHolder> Dispatch for NameDispatcher<H> {
    fn dispatch(
        &self,
        path: &str,
        method: &str,
        ctx: &RequestContext,
        sink: &mut ResponseWriter,
    ) -> Verdict {
        let identifier = derive_identifier(path, method);

        match self.table.get(identifier.as_str()) {
            Some(handler) => {
                handler(&*self.holder, ctx, sink);
                Verdict::Invoked
            }
            None => {
                debug!(path, method, %identifier, "no handler with derived name");
                Verdict::NotFound
            }
        }
    }
}
