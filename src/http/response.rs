//! Streamed plain-text responses.
//!
//! The body has no length; hyper sends it chunked and flushes each chunk as
//! the relay pushes it.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue},
    response::Response,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Wrap the receiving half of a relay channel in a 200 response.
pub fn streaming_response(rx: mpsc::Receiver<Result<Bytes, std::io::Error>>) -> Response {
    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // Browsers buffer text/plain for sniffing otherwise.
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}
