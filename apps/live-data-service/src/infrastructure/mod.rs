//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loading and validation.
pub mod config;

/// Price engine tick loop.
pub mod engine;

/// Price update fan-out to client queues.
pub mod fanout;

/// Synthetic historical data generation and storage.
pub mod history;

/// HTTP and WebSocket server.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// In-memory portfolio store adapter.
pub mod portfolio;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// WebSocket connection gateway.
pub mod ws;
