use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;
use std::sync::Arc;

/// Something that can answer a request by writing into a response sink.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &RequestContext, w: &mut ResponseWriter);
}

impl<F> Handler for F
where
    F: Fn(&RequestContext, &mut ResponseWriter) + Send + Sync,
{
    fn call(&self, ctx: &RequestContext, w: &mut ResponseWriter) {
        self(ctx, w)
    }
}

pub type SharedHandler = Arc<dyn Handler>;

/// Wrap a closure or function as a [`SharedHandler`].
pub fn shared<F>(f: F) -> SharedHandler
where
    F: Fn(&RequestContext, &mut ResponseWriter) + Send + Sync + 'static,
{
    Arc::new(f)
}
