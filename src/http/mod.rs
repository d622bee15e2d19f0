//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, routes)
//!     → request.rs (request ID, url extraction)
//!     → [relay spawns the summarizer]
//!     → response.rs (chunked text/plain body fed by the relay)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, SummaryQuery, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
