use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;
use std::sync::Arc;

/// Outcome of one dispatch.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A handler ran and wrote into the sink.
    Invoked,
    /// No handler matched; nothing ran and the sink is untouched.
    NotFound,
}

impl Verdict {
    pub fn is_invoked(self) -> bool {
        self == Verdict::Invoked
    }
}

/// Resolve a (path, method) pair to a handler and run it.
///
/// Implementations must not panic on odd input: an empty path, stray
/// characters or an unknown method all end in [`Verdict::NotFound`] unless a
/// handler happens to match.
pub trait Dispatch: Send + Sync {
    fn dispatch(
        &self,
        path: &str,
        method: &str,
        ctx: &RequestContext,
        sink: &mut ResponseWriter,
    ) -> Verdict;
}

impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    fn dispatch(
        &self,
        path: &str,
        method: &str,
        ctx: &RequestContext,
        sink: &mut ResponseWriter,
    ) -> Verdict {
        (**self).dispatch(path, method, ctx, sink)
    }
}
