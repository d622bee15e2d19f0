//! Summarizer relay subsystem.
//!
//! # Data Flow
//! ```text
//! GET /summary?url=...
//!     → command.rs (build + spawn the summarizer, url as last argument)
//!     → pump.rs (read stdout/stderr as it arrives)
//!         stdout ─────────────────────────→ body
//!         stderr → filter.rs (markers?) ──→ body
//!         both   → tracing (server-side mirror)
//!     → child exits → failure notice if unsuccessful → body closed
//! ```
//!
//! # Design Decisions
//! - One child and one relay task per request, nothing shared between them
//! - The body channel is bounded, so a slow client slows the child down
//! - Client disconnect, request deadline, and server shutdown kill the child

pub mod command;
pub mod filter;
pub mod pump;

pub use command::{SpawnedChild, SummarizerCommand};
pub use filter::MarkerFilter;
pub use pump::{BodySender, Relay, RelayOutcome, RelayReport, FAILURE_NOTICE};
