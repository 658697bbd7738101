//! In-Memory Portfolio Store Adapter
//!
//! Stand-in for the external investment service: portfolio id to held
//! tickers, seeded at startup. Reads reflect whatever the map holds at
//! call time, matching the read-through contract of the port.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{PortfolioId, PortfolioStore, PortfolioStoreError};
use crate::domain::price::Symbol;

/// Portfolio holdings kept in process memory.
#[derive(Default)]
pub struct InMemoryPortfolioStore {
    holdings: RwLock<HashMap<PortfolioId, Vec<Symbol>>>,
}

impl InMemoryPortfolioStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tickers held by a portfolio.
    pub fn insert(&self, portfolio_id: PortfolioId, tickers: Vec<Symbol>) {
        self.holdings.write().insert(portfolio_id, tickers);
    }
}

#[async_trait]
impl PortfolioStore for InMemoryPortfolioStore {
    async fn holdings(
        &self,
        portfolio_id: PortfolioId,
    ) -> Result<Vec<Symbol>, PortfolioStoreError> {
        self.holdings
            .read()
            .get(&portfolio_id)
            .cloned()
            .ok_or(PortfolioStoreError::NotFound(portfolio_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_inserted_holdings() {
        let store = InMemoryPortfolioStore::new();
        store.insert(7, vec!["GOOGL".to_string(), "MSFT".to_string()]);

        let holdings = store.holdings(7).await.unwrap();
        assert_eq!(holdings, vec!["GOOGL".to_string(), "MSFT".to_string()]);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryPortfolioStore::new();
        let err = store.holdings(404).await.unwrap_err();
        assert!(matches!(err, PortfolioStoreError::NotFound(404)));
    }

    #[tokio::test]
    async fn reads_reflect_later_updates() {
        let store = InMemoryPortfolioStore::new();
        store.insert(1, vec!["AAPL".to_string()]);
        assert_eq!(store.holdings(1).await.unwrap().len(), 1);

        store.insert(1, vec!["AAPL".to_string(), "TSLA".to_string()]);
        assert_eq!(store.holdings(1).await.unwrap().len(), 2);
    }
}
