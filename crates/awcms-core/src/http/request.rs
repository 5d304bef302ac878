//! HTTP/1.x request parsing over a borrowed byte buffer

use heapless::Vec;
use thiserror_no_std::Error;

use crate::auth::HeaderSource;

/// Headers kept per request, extra headers are a parse error
pub const MAX_HEADERS: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// More bytes are needed. `needed` is the total request length when known.
    #[error("incomplete request")]
    Incomplete { needed: Option<usize> },
    #[error("request is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    #[error("too many headers")]
    TooManyHeaders,
    #[error("request too large")]
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    headers: Vec<(&'a str, &'a str), MAX_HEADERS>,
    pub body: &'a [u8],
}

/// Length of the request head including the blank line, once it is complete.
pub fn head_len(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

impl<'a> Request<'a> {
    /// Parse a request from `buf`.
    ///
    /// Returns [`HttpError::Incomplete`] until the head and the full
    /// `Content-Length` body are present, so the caller can keep reading.
    pub fn parse(buf: &'a [u8]) -> Result<Self, HttpError> {
        let head_end = head_len(buf).ok_or(HttpError::Incomplete { needed: None })?;
        let head =
            core::str::from_utf8(&buf[..head_end - 4]).map_err(|_| HttpError::InvalidUtf8)?;

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or("");

        let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::Malformed("request line"));
        };

        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            return Err(HttpError::UnsupportedVersion);
        }
        if !target.starts_with('/') {
            return Err(HttpError::Malformed("request target"));
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or(HttpError::Malformed("header line"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(HttpError::Malformed("header name"));
            }
            headers
                .push((name, value.trim()))
                .map_err(|_| HttpError::TooManyHeaders)?;
        }

        let content_length = match find_header(&headers, "Content-Length") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| HttpError::Malformed("Content-Length"))?,
            None => 0,
        };

        let needed = head_end
            .checked_add(content_length)
            .ok_or(HttpError::TooLarge)?;
        if buf.len() < needed {
            return Err(HttpError::Incomplete {
                needed: Some(needed),
            });
        }

        Ok(Self {
            method: Method::parse(method),
            path,
            query,
            headers,
            body: &buf[head_end..needed],
        })
    }

    pub fn headers(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.headers.iter().copied()
    }
}

impl HeaderSource for Request<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}
