use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Per-dispatch view of a request handed to handlers.
///
/// Besides the request itself it carries typed extensions the transport layer
/// attaches, such as [`PeerAddr`].
#[derive(Debug)]
pub struct RequestContext<'a> {
    request: &'a Request,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl<'a> RequestContext<'a> {
    pub fn new(request: &'a Request) -> RequestContext<'a> {
        RequestContext {
            request,
            extensions: HashMap::new(),
        }
    }

    pub fn with_extension<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
        self
    }

    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.request.get_header(k)
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn request(&self) -> &Request {
        self.request
    }
}

/// Address of the client that sent the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

#[derive(Debug)]
pub struct Request {
    /// Request-line method token, case preserved.
    pub method: String,
    /// Request target as received, query string included.
    pub target: String,
    pub headers: HashMap<String, String>,
    pub content: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Request {
        Request {
            method: method.into(),
            target: target.into(),
            headers: HashMap::new(),
            content: Vec::new(),
        }
    }

    /// The target without its `?query` part; this is what gets dispatched on.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.headers.get(&k.to_lowercase()).map(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_drops_query_string() {
        let req = Request::new("GET", "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust&page=2"));

        let req = Request::new("GET", "/plain");
        assert_eq!(req.path(), "/plain");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn headers_are_case_insensitive() {
        let mut req = Request::new("GET", "/");
        req.headers
            .insert("user-agent".to_string(), "curl/8.0".to_string());

        let ctx = RequestContext::new(&req);
        assert_eq!(ctx.get_header("User-Agent"), Some("curl/8.0"));
        assert_eq!(ctx.get_header("accept"), None);
    }

    #[test]
    fn extensions_are_typed() {
        let req = Request::new("GET", "/");
        let peer = PeerAddr("127.0.0.1:9000".parse().unwrap());
        let ctx = RequestContext::new(&req).with_extension(peer);

        assert_eq!(ctx.extension::<PeerAddr>(), Some(&peer));
        assert_eq!(ctx.extension::<String>(), None);
        assert_eq!(ctx.method(), "GET");
        assert_eq!(ctx.path(), "/");
    }
}
