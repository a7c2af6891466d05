//! Demo site served by `main`, available through both dispatch strategies.

use crate::handler_set;
use crate::http::method::Method;
use crate::http::request::RequestContext;
use crate::http::router::Router;
use crate::http::writer::ResponseWriter;

/// Handler holder for name-derived dispatch.
pub struct Pages;

#[handler_set]
#[allow(non_snake_case)]
impl Pages {
    pub fn Index_GET(&self, ctx: &RequestContext, w: &mut ResponseWriter) {
        index(ctx, w)
    }

    pub fn Pagetwo_GET(&self, ctx: &RequestContext, w: &mut ResponseWriter) {
        page_two(ctx, w)
    }

    pub fn Pagetwo_POST(&self, ctx: &RequestContext, w: &mut ResponseWriter) {
        page_two(ctx, w)
    }
}

/// The same pages as [`Pages`], registered explicitly.
pub fn router() -> Router {
    let mut router = Router::new();
    router
        .register("/", Method::GET, index)
        .register("/pagetwo", Method::GET, page_two)
        .register("/pagetwo", Method::POST, page_two);
    router
}

fn index(_ctx: &RequestContext, w: &mut ResponseWriter) {
    w.set_header("Content-Type", "text/plain");
    w.write_text("Index");
}

fn page_two(ctx: &RequestContext, w: &mut ResponseWriter) {
    w.set_header("Content-Type", "text/plain");
    w.write_text(&format!("{} Page Two!", ctx.method()));
}
