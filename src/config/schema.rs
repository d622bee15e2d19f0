//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the summary relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// How the external summarizer is launched.
    pub summarizer: SummarizerConfig,

    /// Which stderr chunks reach the client.
    pub filter: FilterConfig,

    /// Public asset directory.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum lifetime of one request, streamed body included, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Summarizer process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Executable to launch.
    pub program: String,

    /// Fixed arguments placed before the target URL.
    pub args: Vec<String>,

    /// Working directory for the child (inherits the server's when unset).
    pub working_dir: Option<PathBuf>,

    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,

    /// Kill the child when the client goes away.
    pub kill_on_disconnect: bool,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("PYTHONIOENCODING".to_string(), "utf-8".to_string());
        env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());

        Self {
            program: "python".to_string(),
            args: vec!["summarizer.py".to_string()],
            working_dir: None,
            env,
            kill_on_disconnect: true,
        }
    }
}

/// Marker filter applied to the child's stderr.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Case-sensitive substrings; a stderr chunk containing any of them is forwarded.
    pub markers: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            markers: ["Error", "Fatal", "API Error", "Debug"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory served for unmatched paths; `None` disables static serving.
    pub dir: Option<PathBuf>,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            dir: Some(PathBuf::from("public")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
