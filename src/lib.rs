//! Summary relay library.
//!
//! Accepts `GET /summary?url=...`, runs an external summarizer for the URL
//! and streams its output back as chunked plain text.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use error::RelayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
