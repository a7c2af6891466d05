//! Lookup keys derived from a request's path and method.
//!
//! [`RouteKey`] is the registry key: structural, so two requests share a key
//! only when both path and method match. [`derive_identifier`] is the naming
//! convention used by name-derived dispatch:
//!
//! - `"/"` and `""` become `"index"`;
//! - one leading `/` is stripped, every other `/` becomes `_`, so `"/a//b"`
//!   gives `"A__b"` and `"/about/"` gives `"About_"`;
//! - the first character is ASCII-uppercased, so a non-ASCII or non-letter
//!   first character passes through untouched; every other character is
//!   lowercased (Unicode-aware, `"/über/ÄÖ"` gives `"über_äö"`);
//! - `_` and the method token are appended verbatim.
//!
//! The convention is not injective: `"/a/b"` and `"/a_b"` both name `A_b`.

use std::fmt;

const INDEX_PATH: &str = "/index";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    path: String,
    method: String,
}

impl RouteKey {
    pub fn new(path: &str, method: &str) -> RouteKey {
        RouteKey {
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.path, self.method)
    }
}

pub fn derive_identifier(path: &str, method: &str) -> String {
    let path = if path.is_empty() || path == "/" {
        INDEX_PATH
    } else {
        path
    };
    let rest = path.strip_prefix('/').unwrap_or(path);

    let mut ident = String::with_capacity(rest.len() + method.len() + 1);
    let mut chars = rest.chars();

    if let Some(first) = chars.next() {
        ident.push(if first == '/' {
            '_'
        } else {
            first.to_ascii_uppercase()
        });
    }
    for c in chars {
        if c == '/' {
            ident.push('_');
        } else {
            ident.extend(c.to_lowercase());
        }
    }

    ident.push('_');
    ident.push_str(method);
    ident
}
