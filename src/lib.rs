//! A small HTTP/1.1 server that routes each request by its (path, method) pair.
//!
//! Two dispatchers sit behind the [`http::dispatch::Dispatch`] seam:
//!
//! - [`http::router::Router`] keeps an explicit registration table keyed by
//!   [`http::key::RouteKey`];
//! - [`http::named::NameDispatcher`] derives a handler name such as
//!   `Pagetwo_POST` from the request and resolves it among the public methods
//!   exported by [`handler_set`].

extern crate self as http_dispatch;

pub mod concurrency;
pub mod http;
pub mod pages;

pub use http_dispatch_macros::handler_set;
