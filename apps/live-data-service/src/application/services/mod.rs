//! Application Services

/// Portfolio holdings resolution for subscriptions.
pub mod portfolio;

pub use portfolio::PortfolioBridge;
