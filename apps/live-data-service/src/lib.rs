#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Live Data Service - Simulated Market Data Streamer
//!
//! Simulates real-time stock prices with a geometric-Brownian-motion tick
//! loop and streams updates to WebSocket clients, each receiving only the
//! symbols it subscribed to.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core simulation and subscription logic
//!   - `price`: Price book, tick math, simulation parameters
//!   - `stock`: Stock universe and listing metadata
//!   - `subscription`: Per-connection subscription tracking
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Portfolio store interface
//!   - `services`: Portfolio holdings resolution
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `engine`: Interval-driven tick loop
//!   - `fanout`: Per-connection delivery of price deltas
//!   - `ws`: WebSocket connection gateway and control protocol
//!   - `history`: Synthetic OHLCV generation
//!   - `http`: axum server for streaming, REST, and ops endpoints
//!   - `config`: Environment configuration with fatal validation
//!
//! # Data Flow
//!
//! ```text
//! ┌──────────────┐      ┌─────────────┐     ┌─────────────┐
//! │ Price Engine │─────▶│   Fan-out   │────▶│  WebSocket  │──▶ Client 1
//! │  (GBM tick)  │ mpsc │ Broadcaster │     │   Gateway   │──▶ Client 2
//! └──────────────┘      └─────────────┘     └─────────────┘──▶ Client N
//!                              ▲
//!                     Subscription Registry
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core simulation types with no external integrations.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::price::{PriceBook, PriceDelta, SimulationParams, Symbol};
pub use domain::stock::{StockListing, default_universe};
pub use domain::subscription::{ConnectionId, RegistryStats, SubscriptionRegistry};

// Application ports and services
pub use application::ports::{PortfolioId, PortfolioStore, PortfolioStoreError};
pub use application::services::PortfolioBridge;

// Infrastructure config
pub use infrastructure::config::{ConfigError, ServerSettings, ServiceConfig, SimulationSettings};

// Engine and fan-out (for integration tests)
pub use infrastructure::engine::{EngineState, PriceEngine};
pub use infrastructure::fanout::{ClientRegistry, FanoutBroadcaster, PriceUpdateMessage};

// HTTP server
pub use infrastructure::http::{ApiServer, AppState, ServeError};

// History
pub use infrastructure::history::HistoryRepository;

// Portfolio adapter (for integration tests)
pub use infrastructure::portfolio::InMemoryPortfolioStore;

// Gateway
pub use infrastructure::ws::{ControlCommand, ControlError, Gateway, parse_control};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
