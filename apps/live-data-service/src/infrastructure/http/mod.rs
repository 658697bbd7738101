//! HTTP and WebSocket Server
//!
//! Single axum server carrying the streaming and REST surface plus the
//! operational endpoints, all on one port.
//!
//! # Endpoints
//!
//! - `GET /ws/stocks` - WebSocket price stream
//! - `GET /api/v1/stocks/history/{symbol}` - Year of daily OHLCV bars
//! - `GET /api/v1/stocks/meta-data/{symbol}` - Listing metadata
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (ready after the first tick)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::stock::StockListing;
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::engine::EngineState;
use crate::infrastructure::fanout::ClientRegistry;
use crate::infrastructure::history::HistoryRepository;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::ws::{Gateway, ws_handler};

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Price engine status.
    pub engine: EngineStatus,
    /// Active client count.
    pub clients: ClientStatus,
    /// Subscription statistics.
    pub subscriptions: SubscriptionStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Engine is ticking.
    Healthy,
    /// Engine has not completed a tick yet.
    Degraded,
}

/// Price engine status.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Completed ticks since startup.
    pub ticks: u64,
    /// When the last tick completed.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Symbols in the price book.
    pub symbols: usize,
}

/// Active client information.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    /// Total open WebSocket connections.
    pub total: usize,
}

/// Subscription statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    /// Connections with at least one subscription.
    pub connections: usize,
    /// Distinct symbols subscribed across all connections.
    pub symbols: usize,
}

// =============================================================================
// Application State
// =============================================================================

/// Shared state for every HTTP and WebSocket handler.
pub struct AppState {
    /// Service version reported by `/health`.
    pub version: String,
    /// Connection gateway for the WebSocket route.
    pub gateway: Gateway,
    /// Engine progress for health reporting.
    pub engine: Arc<EngineState>,
    /// Subscription registry, for health stats.
    pub subscriptions: Arc<SubscriptionRegistry>,
    /// Client registry, for health stats.
    pub clients: Arc<ClientRegistry>,
    /// Listing metadata served by the meta-data endpoint.
    pub universe: Vec<StockListing>,
    /// Generated history served by the history endpoint.
    pub history: Arc<HistoryRepository>,
    /// Symbols in the live price book.
    pub symbol_count: usize,
    started_at: Instant,
}

impl AppState {
    /// Assemble the handler state.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: String,
        gateway: Gateway,
        engine: Arc<EngineState>,
        subscriptions: Arc<SubscriptionRegistry>,
        clients: Arc<ClientRegistry>,
        universe: Vec<StockListing>,
        history: Arc<HistoryRepository>,
    ) -> Self {
        let symbol_count = universe.len();
        Self {
            version,
            gateway,
            engine,
            subscriptions,
            clients,
            universe,
            history,
            symbol_count,
            started_at: Instant::now(),
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// The service's HTTP server.
pub struct ApiServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a server for the given state.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServeError` if binding fails or the HTTP server encounters a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), ServeError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServeError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServeError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the full route table.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/stocks", get(ws_handler))
        .route("/api/v1/stocks/history/{symbol}", get(history_handler))
        .route("/api/v1/stocks/meta-data/{symbol}", get(metadata_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn history_handler(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    state.history.time_series(&symbol).map_or_else(
        || (StatusCode::NOT_FOUND, format!("No history for symbol: {symbol}")).into_response(),
        |series| Json(series).into_response(),
    )
}

async fn metadata_handler(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    state
        .universe
        .iter()
        .find(|listing| listing.symbol == symbol)
        .map_or_else(
            || (StatusCode::NOT_FOUND, format!("No listing for symbol: {symbol}")).into_response(),
            |listing| Json(listing.clone()).into_response(),
        )
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(build_health_response(&state)))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.engine.has_ticked() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let registry_stats = state.subscriptions.stats();
    let status = if state.engine.has_ticked() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        engine: EngineStatus {
            ticks: state.engine.tick_count(),
            last_tick_at: state.engine.last_tick_at(),
            symbols: state.symbol_count,
        },
        clients: ClientStatus {
            total: state.clients.count(),
        },
        subscriptions: SubscriptionStatus {
            connections: registry_stats.connection_count,
            symbols: registry_stats.symbol_count,
        },
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
