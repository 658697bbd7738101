//! Portfolio Store Port (Driven Port)
//!
//! Interface to the external portfolio service. The core only needs one
//! read: the tickers a portfolio currently holds.

use async_trait::async_trait;

use crate::domain::price::Symbol;

/// Identifier of a portfolio in the external store.
pub type PortfolioId = i64;

/// Portfolio store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortfolioStoreError {
    /// No portfolio exists with the given id.
    #[error("Portfolio not found with ID: {0}")]
    NotFound(PortfolioId),

    /// The backing store failed.
    #[error("Portfolio store error: {0}")]
    Backend(String),
}

/// Port for reading portfolio holdings.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// The tickers held by a portfolio, in store order, duplicates allowed
    /// (one per position).
    async fn holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Symbol>, PortfolioStoreError>;
}
