//! Transport-independent HTTP layer
//!
//! The firmware (embassy-net sockets) and the simulator (`std::net`) both
//! read bytes until [`Request::parse`] succeeds, pass the request to
//! [`routes::handle`] and write the [`Response`] back.

pub mod request;
pub mod response;
pub mod routes;

pub use request::{HttpError, MAX_HEADERS, Method, Request, head_len};
pub use response::{PostAction, Response, Status};
pub use routes::{ApiContext, SystemInfo, handle};

/// Requests larger than this are rejected
pub const MAX_REQUEST_SIZE: usize = 1024;
