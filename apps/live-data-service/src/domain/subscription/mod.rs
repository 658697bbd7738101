//! Subscription Registry
//!
//! Domain types for tracking which symbols each live connection wants
//! price updates for.
//!
//! # Design
//!
//! The registry maps a connection to its subscribed symbols along with the
//! last price delivered to it (zero until the first update goes out). Many
//! connection tasks subscribe/unsubscribe concurrently while the fan-out
//! pass iterates the whole registry each tick, so the map is locked in two
//! levels: an outer lock guards membership, and each connection's state has
//! its own lock. Mutating one connection's set never serializes the others,
//! and the fan-out pass never holds the outer lock across a send.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::price::Symbol;

/// Unique identifier for a live connection.
pub type ConnectionId = u64;

// =============================================================================
// Per-Connection State
// =============================================================================

/// Symbols one connection is subscribed to, with the last delivered price.
#[derive(Debug, Default)]
struct ConnectionSubscriptions {
    /// Symbol to last delivered price (zero placeholder until first send).
    prices: HashMap<Symbol, Decimal>,
}

impl ConnectionSubscriptions {
    fn add(&mut self, symbols: &[Symbol]) {
        for symbol in symbols {
            // Idempotent: re-subscribing keeps the last delivered price.
            self.prices.entry(symbol.clone()).or_insert(Decimal::ZERO);
        }
    }

    fn remove(&mut self, symbols: &[Symbol]) {
        for symbol in symbols {
            self.prices.remove(symbol);
        }
    }

    fn symbol_set(&self) -> HashSet<Symbol> {
        self.prices.keys().cloned().collect()
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Tracks, per open connection, the set of symbols it wants updates for.
///
/// # Example
///
/// ```rust
/// use live_data_service::domain::subscription::SubscriptionRegistry;
///
/// let registry = SubscriptionRegistry::new();
/// registry.subscribe(1, &["AAPL".to_string()]);
/// registry.subscribe(1, &["AAPL".to_string()]); // idempotent
///
/// let snapshot = registry.snapshot_for(1).unwrap();
/// assert_eq!(snapshot.len(), 1);
///
/// registry.remove(1);
/// assert!(registry.snapshot_for(1).is_none());
/// ```
#[derive(Default)]
pub struct SubscriptionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<RwLock<ConnectionSubscriptions>>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add symbols to a connection's subscription set.
    ///
    /// Creates the connection entry on first use. Adding an already
    /// subscribed symbol is a no-op.
    pub fn subscribe(&self, connection: ConnectionId, symbols: &[Symbol]) {
        let entry = {
            let mut connections = self.connections.write();
            Arc::clone(connections.entry(connection).or_default())
        };
        entry.write().add(symbols);
    }

    /// Remove symbols from a connection's subscription set.
    ///
    /// Prunes the connection entry once its set becomes empty. Unknown
    /// connections and symbols are ignored.
    pub fn unsubscribe(&self, connection: ConnectionId, symbols: &[Symbol]) {
        let Some(entry) = self.entry(connection) else {
            return;
        };

        let now_empty = {
            let mut state = entry.write();
            state.remove(symbols);
            state.prices.is_empty()
        };

        if now_empty {
            let mut connections = self.connections.write();
            // Re-check under the outer lock; a concurrent subscribe may
            // have repopulated the set.
            if let Some(entry) = connections.get(&connection)
                && entry.read().prices.is_empty()
            {
                connections.remove(&connection);
            }
        }
    }

    /// Drop a connection's entire entry (disconnect path).
    pub fn remove(&self, connection: ConnectionId) {
        self.connections.write().remove(&connection);
    }

    /// Point-in-time view of one connection's subscribed symbols.
    ///
    /// Returns `None` if the connection has no subscriptions.
    #[must_use]
    pub fn snapshot_for(&self, connection: ConnectionId) -> Option<HashSet<Symbol>> {
        self.entry(connection).map(|e| e.read().symbol_set())
    }

    /// Record the price last delivered to a connection for a symbol.
    ///
    /// Ignored if the connection unsubscribed in the meantime.
    pub fn record_price(&self, connection: ConnectionId, symbol: &str, price: Decimal) {
        if let Some(entry) = self.entry(connection)
            && let Some(slot) = entry.write().prices.get_mut(symbol)
        {
            *slot = price;
        }
    }

    /// The last price delivered to a connection for a symbol.
    #[must_use]
    pub fn last_delivered(&self, connection: ConnectionId, symbol: &str) -> Option<Decimal> {
        self.entry(connection)
            .and_then(|e| e.read().prices.get(symbol).copied())
    }

    /// All connections that currently hold subscriptions.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.read().keys().copied().collect()
    }

    /// Registry statistics for health reporting.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let connections = self.connections.read();
        let mut symbols = HashSet::new();
        for entry in connections.values() {
            symbols.extend(entry.read().prices.keys().cloned());
        }
        RegistryStats {
            connection_count: connections.len(),
            symbol_count: symbols.len(),
        }
    }

    fn entry(&self, connection: ConnectionId) -> Option<Arc<RwLock<ConnectionSubscriptions>>> {
        self.connections.read().get(&connection).map(Arc::clone)
    }
}

/// Counts of active subscriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    /// Connections with at least one subscription.
    pub connection_count: usize,
    /// Distinct symbols subscribed across all connections.
    pub symbol_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
