//! Request handling.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) for every request that lacks one
//! - Extract and check the target URL of a summary request
//!
//! The URL is only checked for presence. Scheme, shape and reachability are
//! the summarizer's problem.

use axum::http::{HeaderMap, HeaderValue, Request};
use serde::Deserialize;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::error::{RelayError, MISSING_URL_MESSAGE};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Query string of `GET /summary`.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub url: Option<String>,
}

impl SummaryQuery {
    /// The target URL, or `BadRequest` when it is missing or empty.
    pub fn target_url(&self) -> Result<&str, RelayError> {
        match self.url.as_deref() {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(RelayError::BadRequest(MISSING_URL_MESSAGE)),
        }
    }
}
