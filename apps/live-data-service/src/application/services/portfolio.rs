//! Portfolio Bridge
//!
//! Translates a portfolio id into its set of held tickers at subscribe
//! time. One read-through per call; holdings changing after the subscribe
//! are deliberately not reflected.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::ports::{PortfolioId, PortfolioStore, PortfolioStoreError};
use crate::domain::price::Symbol;

/// Resolves portfolio holdings into subscription symbol sets.
pub struct PortfolioBridge {
    store: Arc<dyn PortfolioStore>,
}

impl PortfolioBridge {
    /// Create a bridge over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PortfolioStore>) -> Self {
        Self { store }
    }

    /// The distinct tickers the portfolio holds right now.
    ///
    /// # Errors
    ///
    /// Returns [`PortfolioStoreError::NotFound`] for an unknown portfolio id
    /// and [`PortfolioStoreError::Backend`] if the store read fails.
    pub async fn resolve_symbols(
        &self,
        portfolio_id: PortfolioId,
    ) -> Result<HashSet<Symbol>, PortfolioStoreError> {
        let holdings = self.store.holdings(portfolio_id).await?;
        Ok(holdings.into_iter().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
