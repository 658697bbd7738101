//! Live Data Service Binary
//!
//! Starts the simulated market data streamer.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin live-data-service
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `LIVE_DATA_PORT`: HTTP and WebSocket port (default: 8080)
//! - `LIVE_DATA_TICK_INTERVAL_SECS`: Seconds between ticks (default: 5)
//! - `LIVE_DATA_TIMEFRAME_SECS`: Drift/volatility timeframe (default: 3600)
//! - `LIVE_DATA_DRIFT_PCT`: Drift per timeframe (default: 0.02)
//! - `LIVE_DATA_VOLATILITY_PCT`: Volatility per timeframe (default: 0.05)
//! - `LIVE_DATA_PRICE_FLOOR`: Absolute price floor (default: 0.01)
//! - `LIVE_DATA_SYMBOLS`: Seed overrides, e.g. `AAPL:172.45,GOOGL:2840.10`
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: live-data-service)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use live_data_service::infrastructure::telemetry;
use live_data_service::{
    ApiServer, AppState, ClientRegistry, EngineState, FanoutBroadcaster, Gateway,
    HistoryRepository, InMemoryPortfolioStore, PortfolioBridge, PriceBook, PriceEngine,
    ServiceConfig, SubscriptionRegistry, init_metrics,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the engine-to-fan-out delta channel.
const DELTA_CHANNEL_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Live Data Service");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Generate the historical dataset; the final close per symbol seeds the
    // live price book.
    let universe = config.universe();
    let mut rng = StdRng::from_os_rng();
    let (history, seeds) = HistoryRepository::generate(&universe, &mut rng);

    let book = Arc::new(PriceBook::new(config.simulation.to_params(), seeds));
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let clients = Arc::new(ClientRegistry::new());
    let engine_state = Arc::new(EngineState::new());

    let portfolio_store = Arc::new(seed_demo_portfolios());
    let portfolio = Arc::new(PortfolioBridge::new(portfolio_store));

    // Engine -> fan-out delta channel
    let (delta_tx, delta_rx) = mpsc::channel(DELTA_CHANNEL_CAPACITY);

    let engine = PriceEngine::new(
        Arc::clone(&book),
        delta_tx,
        Arc::clone(&engine_state),
        shutdown_token.clone(),
    );
    tokio::spawn(engine.run());

    let broadcaster = FanoutBroadcaster::new(
        Arc::clone(&subscriptions),
        Arc::clone(&clients),
        delta_rx,
        shutdown_token.clone(),
    );
    tokio::spawn(broadcaster.run());

    let gateway = Gateway::new(
        Arc::clone(&subscriptions),
        Arc::clone(&clients),
        portfolio,
    );
    let state = Arc::new(AppState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        gateway,
        engine_state,
        subscriptions,
        clients,
        universe,
        Arc::new(history),
    ));

    let server = ApiServer::new(config.server.port, state, shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!("Live data service ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Live data service stopped");
    Ok(())
}

/// Seed the in-memory portfolio store with demo holdings.
fn seed_demo_portfolios() -> InMemoryPortfolioStore {
    let store = InMemoryPortfolioStore::new();
    store.insert(1, vec!["AAPL".to_string(), "MSFT".to_string()]);
    store.insert(2, vec!["GOOGL".to_string(), "AMZN".to_string()]);
    store.insert(
        3,
        vec!["AAPL".to_string(), "TSLA".to_string(), "NVDA".to_string()],
    );
    store
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        port = config.server.port,
        tick_interval_secs = config.simulation.tick_interval.as_secs(),
        timeframe_secs = config.simulation.timeframe.as_secs(),
        drift_pct = config.simulation.drift_pct,
        volatility_pct = config.simulation.volatility_pct,
        price_floor = %config.simulation.price_floor,
        overrides = config
            .symbol_overrides
            .as_ref()
            .map_or(0, std::vec::Vec::len),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
