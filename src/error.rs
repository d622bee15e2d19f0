//! Errors surfaced by the relay before a response starts streaming.
//!
//! Once headers are flushed nothing here applies any more: a failed child is
//! reported inside the 200 body (see [`crate::relay::FAILURE_NOTICE`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Message returned when the `url` query parameter is absent or empty.
pub const MISSING_URL_MESSAGE: &str = "URL 파라미터가 없습니다.";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The request did not name a target URL.
    #[error("{0}")]
    BadRequest(&'static str),

    /// The summarizer could not be started.
    #[error("failed to spawn summarizer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A spawned child came back without one of its piped handles.
    #[error("summarizer {0} pipe was not captured")]
    MissingPipe(&'static str),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Spawn { .. } | RelayError::MissingPipe(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label used for the `relay_requests_total` outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "bad_request",
            RelayError::Spawn { .. } | RelayError::MissingPipe(_) => "spawn_failed",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            RelayError::BadRequest(message) => (*message).to_string(),
            RelayError::Spawn { .. } | RelayError::MissingPipe(_) => {
                tracing::error!(error = %self, "Summarizer could not be started");
                "Failed to start the summarizer".to_string()
            }
        };
        (status, [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
            .into_response()
    }
}
