//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PortfolioStore`: read-only access to portfolio holdings in the
//!   external investment service.

mod portfolio_store;

pub use portfolio_store::{PortfolioId, PortfolioStore, PortfolioStoreError};
