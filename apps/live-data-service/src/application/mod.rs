//! Application Layer - Use cases and port definitions.

/// Port interfaces implemented by infrastructure adapters.
pub mod ports;

/// Application services built on the ports.
pub mod services;
