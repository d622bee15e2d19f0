//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relays and handlers produce:
//!     → logging.rs (structured log events, summarizer output mirror)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
