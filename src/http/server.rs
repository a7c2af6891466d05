//! Transport layer: accepts connections, parses one HTTP/1.1 request per
//! connection, asks a [`Dispatch`] implementation to handle it and writes the
//! outcome back.

use crate::concurrency::ThreadPool;
use crate::http;
use crate::http::dispatch::{Dispatch, Verdict};
use crate::http::request::{PeerAddr, Request, RequestContext};
use crate::http::writer::ResponseWriter;
use crate::http::{BUFFER_SIZE, Response};
use anyhow::{Context, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::min;
use std::collections::HashMap;
use std::io;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
const MAX_HEAD_LENGTH: usize = 16 * 1024;
const MAX_HEADERS: usize = 100;
const MAX_CONTENT_LENGTH: usize = 8 * 1024 * 1024;

static REQUEST_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<method>[!#$%&'*+.^_`|~0-9A-Za-z-]+) (?P<target>\S+) (?P<version>HTTP/\d\.\d)$")
        .expect("request-line pattern is valid")
});

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("can't bind address {addr}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("error accepting connection")]
    Accept(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<dyn Dispatch>,
    pool: ThreadPool,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        num_workers: usize,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Result<Server, ServerError> {
        Ok(Server {
            listener,
            dispatcher,
            pool: ThreadPool::new(num_workers)?,
        })
    }

    pub fn from_tcp_addr(
        addr: &str,
        num_workers: usize,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Result<Server, ServerError> {
        let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Server::new(listener, num_workers, dispatcher)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails for good. Once this is
    /// called the dispatcher is only ever read.
    pub fn run(self) -> Result<(), ServerError> {
        info!(addr = ?self.listener.local_addr().ok(), workers = self.pool.size(), "listening");

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => match accept_backoff(&e) {
                    Some(pause) => {
                        warn!(error = %e, "accept failed, continuing");
                        if !pause.is_zero() {
                            thread::sleep(pause);
                        }
                        continue;
                    }
                    None => return Err(ServerError::Accept(e)),
                },
            };
            let dispatcher = Arc::clone(&self.dispatcher);
            self.pool
                .execute(move || process_incoming(dispatcher.as_ref(), stream));
        }
        Ok(())
    }
}

/// How long to pause before accepting again, or `None` if the error is fatal.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => Some(Duration::ZERO),
        io::ErrorKind::OutOfMemory => Some(ACCEPT_BACKOFF),
        _ if out_of_descriptors(e) => Some(ACCEPT_BACKOFF),
        _ => None,
    }
}

#[cfg(unix)]
fn out_of_descriptors(e: &io::Error) -> bool {
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;
    matches!(e.raw_os_error(), Some(ENFILE | EMFILE))
}

#[cfg(not(unix))]
fn out_of_descriptors(_e: &io::Error) -> bool {
    false
}

/// Reader that refuses to read past a fixed point in time.
///
/// The socket timeout bounds each read; this bounds the whole request, so a
/// client trickling bytes can't hold a worker forever.
struct Deadline<R> {
    inner: R,
    until: Instant,
}

impl<R: Read> Deadline<R> {
    fn new(inner: R, within: Duration) -> Deadline<R> {
        Deadline {
            inner,
            until: Instant::now() + within,
        }
    }
}

impl<R: Read> Read for Deadline<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if Instant::now() >= self.until {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "request not received in time",
            ));
        }
        self.inner.read(buf)
    }
}

fn process_incoming(dispatcher: &dyn Dispatch, mut stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    debug!(?peer, "accepted new connection");

    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        warn!(?peer, error = %e, "can't set read timeout");
    }

    let mut reader = Deadline::new(&mut stream, REQUEST_DEADLINE);
    let response = match read_request(&mut reader) {
        Ok(request) => respond(dispatcher, &request, peer),
        Err(e) => {
            warn!(?peer, error = %e, "malformed request");
            http::bad_request()
        }
    };

    if let Err(e) = stream.write_all(&serialize_response(&response)) {
        warn!(?peer, error = %e, "failed to write response");
    }
}

/// Dispatch a parsed request and turn the verdict into a response.
///
/// `NotFound` becomes a 404; `Invoked` becomes whatever the handler wrote. A
/// panicking handler is answered with a 500 instead of taking the worker down.
pub fn respond(dispatcher: &dyn Dispatch, request: &Request, peer: Option<SocketAddr>) -> Response {
    let mut ctx = RequestContext::new(request);
    if let Some(peer) = peer {
        ctx = ctx.with_extension(PeerAddr(peer));
    }

    let path = request.path();
    let method = request.method.as_str();
    let mut sink = ResponseWriter::new();

    let verdict = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatcher.dispatch(path, method, &ctx, &mut sink)
    }));

    let response = match verdict {
        Ok(Verdict::Invoked) => sink.into_response(),
        Ok(Verdict::NotFound) => http::not_found(),
        Err(_) => {
            error!(method, path, "handler panicked");
            http::internal_server_error()
        }
    };

    info!(method, path, status = response.status.code_num, "handled request");
    response
}

fn read_request(readable: &mut impl Read) -> anyhow::Result<Request> {
    let mut rdr = BufReader::new(readable);

    let mut head_budget = MAX_HEAD_LENGTH;

    let mut first_line = String::new();
    read_head_line(&mut rdr, &mut first_line, &mut head_budget)?;

    let caps = REQUEST_LINE_RE
        .captures(first_line.trim_ascii())
        .ok_or(anyhow!("Bad start-line"))?;

    if &caps["version"] != "HTTP/1.1" {
        bail!("Unsupported HTTP version");
    }

    let method = caps["method"].to_string();
    let target = caps["target"].to_string();

    let mut headers: HashMap<String, String> = HashMap::new();
    let mut line = String::new();

    loop {
        line.clear();
        let n = read_head_line(&mut rdr, &mut line, &mut head_budget)?;

        if n == 0 || line.trim_ascii().is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            bail!("Too many headers");
        }

        let (k, v) = line
            .trim_ascii()
            .split_once(":")
            .ok_or(anyhow!("Invalid header"))?;
        headers.insert(k.trim_ascii().to_lowercase(), String::from(v.trim_ascii()));
    }

    let content = if let Some(content_length_raw) = headers.get("content-length") {
        let content_length: usize = content_length_raw.parse().context("Invalid header value")?;
        if content_length > MAX_CONTENT_LENGTH {
            bail!("Content too large: {} bytes", content_length);
        }
        read_content(&mut rdr, content_length)?
    } else {
        Vec::default()
    };

    Ok(Request {
        method,
        target,
        headers,
        content,
    })
}

/// Read one line of the request head, charging it against `budget`.
fn read_head_line(
    rdr: &mut impl BufRead,
    line: &mut String,
    budget: &mut usize,
) -> anyhow::Result<usize> {
    let n = rdr
        .by_ref()
        .take(*budget as u64)
        .read_line(line)
        .context("Can't read line")?;

    if n == *budget && !line.ends_with('\n') {
        bail!("Request head larger than {} bytes", MAX_HEAD_LENGTH);
    }
    *budget -= n;
    Ok(n)
}

fn read_content(
    rdr: &mut BufReader<&mut impl Read>,
    mut content_length: usize,
) -> anyhow::Result<Vec<u8>> {
    let mut content = Vec::with_capacity(content_length);
    while content_length > 0 {
        let mut buf: [u8; BUFFER_SIZE] = [0u8; BUFFER_SIZE];
        let slice_to_read = &mut buf[..min(BUFFER_SIZE, content_length)];

        let bytes_read = rdr
            .read(slice_to_read)
            .context("Error while reading content")?;
        if bytes_read == 0 {
            bail!("Content ended {} bytes short", content_length);
        }
        content.extend_from_slice(&slice_to_read[..bytes_read]);
        content_length -= bytes_read;
    }
    Ok(content)
}

pub fn serialize_response(response: &Response) -> Vec<u8> {
    let content_len = response.content.as_ref().map(|c| c.len()).unwrap_or(0);
    let mut resp_bytes = Vec::with_capacity(content_len + response.headers.len() * 32);

    resp_bytes.extend(format!("HTTP/1.1 {}\r\n", response.status).as_bytes());

    for (key, value) in &response.headers {
        resp_bytes.extend(format!("{}: {}\r\n", key, value).as_bytes());
    }

    if let Some(c) = &response.content {
        resp_bytes.extend(format!("Content-Length: {}\r\n", c.len()).as_bytes());
        resp_bytes.extend("\r\n".as_bytes());
        resp_bytes.extend(c);
    } else {
        resp_bytes.extend("\r\n".as_bytes());
    }

    resp_bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::named::NameDispatcher;
    use crate::http::router::Router;
    use crate::http::status::Status;
    use crate::pages::{self, Pages};

    fn parse(raw: &str) -> anyhow::Result<Request> {
        read_request(&mut raw.as_bytes())
    }

    #[test]
    fn parses_request_line_headers_and_body() {
        let req = parse(
            "POST /pagetwo?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello",
        )
        .unwrap();

        assert_eq!(req.method, "POST");
        assert_eq!(req.target, "/pagetwo?x=1");
        assert_eq!(req.path(), "/pagetwo");
        assert_eq!(req.get_header("host"), Some("localhost"));
        assert_eq!(req.content, b"hello");
    }

    #[test]
    fn keeps_unknown_method_tokens() {
        let req = parse("PURGE /cache HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.method, "PURGE");
    }

    #[test]
    fn rejects_malformed_requests() {
        for raw in [
            "",
            "GET /\r\n\r\n",
            "GET / HTTP/1.0\r\n\r\n",
            "G(T / HTTP/1.1\r\n\r\n",
            "GET  / HTTP/1.1\r\n\r\n",
            "GET / HTTP/1.1\r\nno-colon\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort",
            "POST / HTTP/1.1\r\nContent-Length: 999999999999\r\n\r\n",
        ] {
            assert!(parse(raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn caps_request_head() {
        let long_value = "a".repeat(MAX_HEAD_LENGTH);
        assert!(parse(&format!("GET / HTTP/1.1\r\nX-Long: {long_value}\r\n\r\n")).is_err());

        let long_target = format!("GET /{} HTTP/1.1\r\n\r\n", "p".repeat(MAX_HEAD_LENGTH));
        assert!(parse(&long_target).is_err());

        let headers = |count: usize| {
            (0..count)
                .map(|i| format!("X-H{i}: v\r\n"))
                .collect::<String>()
        };
        let req = parse(&format!("GET / HTTP/1.1\r\n{}\r\n", headers(MAX_HEADERS))).unwrap();
        assert_eq!(req.headers.len(), MAX_HEADERS);
        assert!(parse(&format!("GET / HTTP/1.1\r\n{}\r\n", headers(MAX_HEADERS + 1))).is_err());
    }

    #[test]
    fn expired_deadline_stops_reading() {
        let raw = "GET / HTTP/1.1\r\n\r\n".as_bytes();

        let mut late = Deadline::new(raw, Duration::ZERO);
        assert!(read_request(&mut late).is_err());

        let mut on_time = Deadline::new(raw, Duration::from_secs(60));
        assert_eq!(read_request(&mut on_time).unwrap().path(), "/");
    }

    #[test]
    fn transient_accept_errors_are_retried() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert_eq!(accept_backoff(&io::Error::from(kind)), Some(Duration::ZERO));
        }
        assert_eq!(accept_backoff(&io::Error::from(io::ErrorKind::PermissionDenied)), None);
        assert_eq!(accept_backoff(&io::Error::from(io::ErrorKind::InvalidInput)), None);
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_exhaustion_backs_off() {
        assert_eq!(accept_backoff(&io::Error::from_raw_os_error(24)), Some(ACCEPT_BACKOFF));
        assert_eq!(accept_backoff(&io::Error::from_raw_os_error(23)), Some(ACCEPT_BACKOFF));
    }

    #[test]
    fn zero_workers_is_an_error() {
        let server = Server::from_tcp_addr("127.0.0.1:0", 0, Arc::new(pages::router()));
        assert!(matches!(server.err(), Some(ServerError::Io(e)) if e.kind() == io::ErrorKind::InvalidInput));
    }

    #[test]
    fn serializes_status_headers_and_body() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        let resp = Response::from_parts(Status::OK, headers, Some(b"Index".to_vec()));

        assert_eq!(
            serialize_response(&resp),
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nIndex"
        );
        assert_eq!(
            serialize_response(&http::not_found()),
            b"HTTP/1.1 404 Not Found\r\n\r\n"
        );
    }

    #[test]
    fn verdicts_map_to_statuses() {
        let router = pages::router();

        let resp = respond(&router, &Request::new("GET", "/"), None);
        assert_eq!(resp.status, Status::OK);
        assert_eq!(resp.content.as_deref(), Some(&b"Index"[..]));

        let resp = respond(&router, &Request::new("GET", "/missing"), None);
        assert_eq!(resp.status, Status::NOT_FOUND);
        assert!(resp.content.is_none());
    }

    #[test]
    fn handler_panic_becomes_server_error() {
        let mut router = Router::new();
        router.register("/boom", "GET", |_, _| panic!("boom"));

        let resp = respond(&router, &Request::new("GET", "/boom"), None);
        assert_eq!(resp.status, Status::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn peer_address_reaches_handlers() {
        let mut router = Router::new();
        router.register("/whoami", "GET", |ctx, w| {
            if let Some(PeerAddr(addr)) = ctx.extension::<PeerAddr>() {
                w.write_text(&addr.to_string());
            }
        });

        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let resp = respond(&router, &Request::new("GET", "/whoami"), Some(peer));
        assert_eq!(resp.content.as_deref(), Some(&b"10.0.0.7:5555"[..]));
    }

    fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(raw.as_bytes()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    fn serve(dispatcher: Arc<dyn Dispatch>) -> SocketAddr {
        let server = Server::from_tcp_addr("127.0.0.1:0", 2, dispatcher).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || server.run());
        addr
    }

    #[test]
    fn serves_registry_routes_over_tcp() {
        let addr = serve(Arc::new(pages::router()));

        let out = roundtrip(addr, "GET / HTTP/1.1\r\nHost: test\r\n\r\n");
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.ends_with("\r\n\r\nIndex"), "{out}");

        let out = roundtrip(addr, "GET /missing HTTP/1.1\r\n\r\n");
        assert_eq!(out, "HTTP/1.1 404 Not Found\r\n\r\n");

        let out = roundtrip(addr, "nonsense\r\n\r\n");
        assert_eq!(out, "HTTP/1.1 400 Bad Request\r\n\r\n");
    }

    #[test]
    fn serves_named_handlers_over_tcp() {
        let addr = serve(Arc::new(NameDispatcher::new(Pages)));

        let out = roundtrip(
            addr,
            "POST /pagetwo HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi",
        );
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.ends_with("POST Page Two!"), "{out}");

        let out = roundtrip(addr, "GET /?utm=1 HTTP/1.1\r\n\r\n");
        assert!(out.ends_with("\r\n\r\nIndex"), "{out}");
    }
}
