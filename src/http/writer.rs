use crate::http::Response;
use crate::http::status::Status;
use std::collections::HashMap;
use std::io;
use std::io::Write;

/// Response sink a handler writes into.
///
/// Starts out as an empty `200 OK`. After an `Invoked` verdict the transport
/// layer turns whatever was written into a [`Response`].
#[derive(Debug)]
pub struct ResponseWriter {
    status: Status,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        ResponseWriter {
            status: Status::OK,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn set_header(&mut self, k: impl Into<String>, v: impl Into<String>) {
        self.headers.insert(k.into(), v.into());
    }

    pub fn write_text(&mut self, text: &str) {
        self.body.extend_from_slice(text.as_bytes());
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let content = if self.body.is_empty() {
            None
        } else {
            Some(self.body)
        };
        Response::from_parts(self.status, self.headers, content)
    }
}

impl Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writer_is_plain_ok() {
        let resp = ResponseWriter::new().into_response();
        assert_eq!(resp.status, Status::OK);
        assert!(resp.headers.is_empty());
        assert!(resp.content.is_none());
    }

    #[test]
    fn collects_status_headers_and_body() {
        let mut w = ResponseWriter::new();
        w.set_status(Status::CREATED);
        w.set_header("Content-Type", "text/plain");
        w.write_text("POST ");
        write!(w, "Page {}!", "Two").unwrap();

        assert_eq!(w.body(), b"POST Page Two!");

        let resp = w.into_response();
        assert_eq!(resp.status, Status::CREATED);
        assert_eq!(
            resp.headers.get("Content-Type").map(String::as_str),
            Some("text/plain")
        );
        assert_eq!(resp.content.as_deref(), Some(&b"POST Page Two!"[..]));
    }
}
