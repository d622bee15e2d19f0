//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Spawn one summarizer per `/summary` request and stream its output
//! - Serve the public asset directory for everything else
//! - Stop accepting when the shared `Shutdown` fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::http::request::{request_id, MakeRequestUuidV4, SummaryQuery};
use crate::http::response::streaming_response;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::relay::{MarkerFilter, Relay, SummarizerCommand};

/// Chunks buffered between a relay and its response body.
const BODY_CHANNEL_CAPACITY: usize = 64;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub command: Arc<SummarizerCommand>,
    pub filter: Arc<MarkerFilter>,
    pub shutdown: Shutdown,
}

/// HTTP server for the summary relay.
pub struct HttpServer {
    router: Router,
    config: Arc<RelayConfig>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig, shutdown: Shutdown) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            command: Arc::new(SummarizerCommand::new(config.summarizer.clone())),
            filter: Arc::new(MarkerFilter::from_config(&config.filter)),
            config: config.clone(),
            shutdown: shutdown.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/summary", get(summary_handler))
            .route("/favicon.ico", get(favicon_handler));

        if let Some(dir) = &config.static_files.dir {
            router = router.fallback_service(ServeDir::new(dir));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            program = %self.config.summarizer.program,
            "HTTP server starting"
        );

        let mut shutdown = self.shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// `GET /summary?url=...`
///
/// Spawns the summarizer and returns immediately with a streaming body; the
/// relay task keeps feeding it until the child exits.
async fn summary_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Response, RelayError> {
    let request_id = request_id(&headers);

    let url = query.target_url().inspect_err(|e| {
        tracing::warn!(request_id = %request_id, "Summary request without url");
        metrics::record_rejected(e.outcome());
    })?;

    tracing::info!(request_id = %request_id, url = %url, "Summary requested");

    let spawned = state
        .command
        .spawn(url)
        .inspect_err(|e| metrics::record_rejected(e.outcome()))?;

    tracing::info!(
        request_id = %request_id,
        pid = ?spawned.child.id(),
        "Summarizer spawned"
    );

    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    let relay = Relay::new(
        request_id,
        state.filter.clone(),
        Duration::from_secs(state.config.timeouts.request_secs),
        state.shutdown.subscribe(),
    )
    .kill_on_disconnect(state.config.summarizer.kill_on_disconnect);

    tokio::spawn(relay.run(spawned, tx));

    Ok(streaming_response(rx))
}

async fn favicon_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}
