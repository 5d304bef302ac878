//! HTTP responses and head serialization

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use super::request::HttpError;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";

/// Extra headers a single response can carry
pub const MAX_EXTRA_HEADERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    PayloadTooLarge,
    InternalServerError,
    ServiceUnavailable,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::PayloadTooLarge => 413,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "Not Found",
            Self::Conflict => "Conflict",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// Work the transport does after the response has been flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub headers: heapless::Vec<(&'static str, &'static str), MAX_EXTRA_HEADERS>,
    pub body: Vec<u8>,
    pub action: Option<PostAction>,
}

impl Response {
    pub fn new(status: Status, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            headers: heapless::Vec::new(),
            body,
            action: None,
        }
    }

    pub fn json(status: Status, body: String) -> Self {
        Self::new(status, CONTENT_TYPE_JSON, body.into_bytes())
    }

    pub fn text(status: Status, body: &str) -> Self {
        Self::new(status, CONTENT_TYPE_TEXT, body.as_bytes().to_vec())
    }

    pub fn jpeg(body: Vec<u8>) -> Self {
        Self::new(Status::Ok, CONTENT_TYPE_JPEG, body)
    }

    pub fn not_found() -> Self {
        Self::text(Status::NotFound, "Not Found")
    }

    pub fn bad_request(error: &HttpError) -> Self {
        let status = match error {
            HttpError::TooLarge => Status::PayloadTooLarge,
            _ => Status::BadRequest,
        };
        Self::text(status, status.reason())
    }

    /// Add a header. Headers beyond [`MAX_EXTRA_HEADERS`] are dropped.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        if self.headers.push((name, value)).is_err() {
            log::warn!("Response header {} dropped, header list full", name);
        }
        self
    }

    pub fn with_action(mut self, action: PostAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn header(&self, name: &str) -> Option<&'static str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Status line and headers, terminated by the blank line. Every response
    /// closes the connection.
    pub fn write_head(&self, buf: &mut String) {
        let _ = write!(
            buf,
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.len(),
        );
        for (name, value) in &self.headers {
            let _ = write!(buf, "{}: {}\r\n", name, value);
        }
        buf.push_str("\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_head() {
        let response = Response::text(Status::Unauthorized, "Authentication Required")
            .with_header("WWW-Authenticate", "Basic realm=\"AWCMS IoT\"");

        let mut head = String::new();
        response.write_head(&mut head);
        assert_eq!(
            head,
            "HTTP/1.1 401 Unauthorized\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: 23\r\n\
             Connection: close\r\n\
             WWW-Authenticate: Basic realm=\"AWCMS IoT\"\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_header_overflow_is_dropped() {
        let mut response = Response::not_found();
        for _ in 0..MAX_EXTRA_HEADERS + 2 {
            response = response.with_header("X-Test", "1");
        }
        assert_eq!(response.headers.len(), MAX_EXTRA_HEADERS);
    }

    #[test]
    fn test_bad_request_mapping() {
        assert_eq!(
            Response::bad_request(&HttpError::TooLarge).status,
            Status::PayloadTooLarge
        );
        assert_eq!(
            Response::bad_request(&HttpError::InvalidUtf8).status,
            Status::BadRequest
        );
    }
}
