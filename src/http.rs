use crate::http::status::Status;
use std::collections::HashMap;

pub mod dispatch;
pub mod handler;
pub mod key;
pub mod method;
pub mod named;
pub mod request;
pub mod router;
pub mod server;
pub mod status;
pub mod writer;

pub(crate) const BUFFER_SIZE: usize = 1024;

#[derive(Debug)]
pub struct Response {
    pub status: Status,
    pub headers: HashMap<String, String>,
    pub content: Option<Vec<u8>>,
}

impl Response {
    pub fn from_parts(
        status: Status,
        headers: HashMap<String, String>,
        content: Option<Vec<u8>>,
    ) -> Response {
        Response {
            status,
            headers,
            content,
        }
    }
}

pub fn not_found() -> Response {
    Response::from_parts(Status::NOT_FOUND, HashMap::new(), None)
}

pub fn bad_request() -> Response {
    Response::from_parts(Status::BAD_REQUEST, HashMap::new(), None)
}

pub fn internal_server_error() -> Response {
    Response::from_parts(Status::INTERNAL_SERVER_ERROR, HashMap::new(), None)
}
