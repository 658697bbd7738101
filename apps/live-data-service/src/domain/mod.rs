//! Domain Layer - Core simulation types and business logic.
//!
//! This layer contains the price simulation and subscription tracking
//! types with no I/O dependencies.

/// Price book and stochastic tick math.
pub mod price;

/// Static stock listing metadata.
pub mod stock;

/// Subscription tracking per live connection.
pub mod subscription;
