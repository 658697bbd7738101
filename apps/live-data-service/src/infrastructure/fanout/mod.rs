//! Price Update Fan-out
//!
//! Consumes price deltas from the engine's channel and delivers to each
//! connection only the changes relevant to its subscriptions.
//!
//! # Architecture
//!
//! Each connection has a bounded outbound queue drained by a single writer
//! task, so updates to one connection stay in tick order while the fan-out
//! pass itself never awaits a socket. A connection whose queue is closed or
//! full is treated as dead: it is dropped from both registries and the pass
//! continues with the remaining connections.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::price::{PriceDelta, Symbol};
use crate::domain::subscription::{ConnectionId, SubscriptionRegistry};
use crate::infrastructure::metrics;

// =============================================================================
// Outbound Wire Message
// =============================================================================

/// The outbound payload for one connection: subscribed symbols that changed
/// this tick, with prices as JSON numbers.
#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdateMessage {
    /// Symbol to new price.
    #[serde(serialize_with = "serialize_price_map")]
    pub updates: HashMap<Symbol, Decimal>,
}

fn serialize_price_map<S: Serializer>(
    map: &HashMap<Symbol, Decimal>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        map.iter()
            .filter_map(|(symbol, price)| price.to_f64().map(|p| (symbol, p))),
    )
}

// =============================================================================
// Client Registry
// =============================================================================

/// Failure to hand a payload to a connection's outbound queue.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The connection's writer has gone away.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The outbound queue is full (stalled consumer).
    #[error("connection {0} outbound queue is full")]
    Backpressured(ConnectionId),
}

/// Maps each live connection to its outbound message queue.
///
/// The gateway registers a sender when a connection opens; the fan-out pass
/// and control-message handlers push text payloads through it.
#[derive(Default)]
pub struct ClientRegistry {
    clients: parking_lot::RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue.
    pub fn register(&self, connection: ConnectionId, tx: mpsc::Sender<String>) {
        self.clients.write().insert(connection, tx);
        metrics::set_client_connections(self.count() as f64);
    }

    /// Drop a connection. Closing the queue ends its writer task.
    pub fn remove(&self, connection: ConnectionId) {
        self.clients.write().remove(&connection);
        metrics::set_client_connections(self.count() as f64);
    }

    /// Queue a text payload for one connection without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the connection is gone or its queue is full;
    /// either way the caller should tear the connection down.
    pub fn send(&self, connection: ConnectionId, payload: String) -> Result<(), SendError> {
        let tx = self
            .clients
            .read()
            .get(&connection)
            .cloned()
            .ok_or(SendError::Closed(connection))?;

        tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SendError::Closed(connection),
            mpsc::error::TrySendError::Full(_) => SendError::Backpressured(connection),
        })
    }

    /// Number of registered connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.clients.read().len()
    }
}

// =============================================================================
// Fan-out Broadcaster
// =============================================================================

/// Delivers each tick's price delta to the subscribed connections.
pub struct FanoutBroadcaster {
    subscriptions: Arc<SubscriptionRegistry>,
    clients: Arc<ClientRegistry>,
    delta_rx: mpsc::Receiver<PriceDelta>,
    cancel: CancellationToken,
}

impl FanoutBroadcaster {
    /// Create a broadcaster consuming deltas from `delta_rx`.
    #[must_use]
    pub const fn new(
        subscriptions: Arc<SubscriptionRegistry>,
        clients: Arc<ClientRegistry>,
        delta_rx: mpsc::Receiver<PriceDelta>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            subscriptions,
            clients,
            delta_rx,
            cancel,
        }
    }

    /// Run until cancelled or the delta channel closes.
    ///
    /// The pass for the in-flight delta completes before shutdown.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Fan-out broadcaster cancelled");
                    return;
                }
                delta = self.delta_rx.recv() => {
                    match delta {
                        Some(delta) => self.dispatch(&delta),
                        None => {
                            tracing::info!("Delta channel closed, fan-out broadcaster stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Fan one delta out to every subscribed connection.
    ///
    /// A failed send drops that connection; the remaining connections still
    /// receive their updates in the same pass.
    pub fn dispatch(&self, delta: &PriceDelta) {
        if delta.is_empty() {
            return;
        }

        for connection in self.subscriptions.connection_ids() {
            let Some(subscribed) = self.subscriptions.snapshot_for(connection) else {
                continue;
            };

            let relevant: HashMap<Symbol, Decimal> = delta
                .updates
                .iter()
                .filter(|(symbol, _)| subscribed.contains(*symbol))
                .map(|(symbol, price)| (symbol.clone(), *price))
                .collect();

            if relevant.is_empty() {
                continue;
            }

            let message = PriceUpdateMessage { updates: relevant };
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(connection, error = %e, "Failed to serialize price update");
                    continue;
                }
            };

            match self.clients.send(connection, payload) {
                Ok(()) => {
                    for (symbol, price) in &message.updates {
                        self.subscriptions.record_price(connection, symbol, *price);
                    }
                    metrics::record_updates_sent(message.updates.len() as u64);
                }
                Err(e) => {
                    tracing::warn!(connection, error = %e, "Dropping dead connection during fan-out");
                    metrics::record_send_failure();
                    self.clients.remove(connection);
                    self.subscriptions.remove(connection);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn delta(pairs: &[(&str, &str)]) -> PriceDelta {
        PriceDelta {
            updates: pairs
                .iter()
                .map(|(s, p)| ((*s).to_string(), dec(p)))
                .collect(),
        }
    }

    fn harness() -> (Arc<SubscriptionRegistry>, Arc<ClientRegistry>, FanoutBroadcaster) {
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let clients = Arc::new(ClientRegistry::new());
        let (_tx, rx) = mpsc::channel(8);
        let broadcaster = FanoutBroadcaster::new(
            Arc::clone(&subscriptions),
            Arc::clone(&clients),
            rx,
            CancellationToken::new(),
        );
        (subscriptions, clients, broadcaster)
    }

    fn connect(clients: &ClientRegistry, id: ConnectionId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(8);
        clients.register(id, tx);
        rx
    }

    fn parse_updates(payload: &str) -> serde_json::Value {
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        value["updates"].clone()
    }

    #[test]
    fn delivers_only_subscribed_symbols() {
        let (subscriptions, clients, broadcaster) = harness();
        let mut rx = connect(&clients, 1);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        broadcaster.dispatch(&delta(&[("AAPL", "101.00"), ("GOOGL", "2840.10")]));

        let payload = rx.try_recv().unwrap();
        let updates = parse_updates(&payload);
        assert_eq!(updates["AAPL"], 101.0);
        assert!(updates.get("GOOGL").is_none());
    }

    #[test]
    fn unsubscribed_connection_receives_nothing() {
        let (subscriptions, clients, broadcaster) = harness();
        let mut rx = connect(&clients, 1);
        subscriptions.subscribe(1, &["TSLA".to_string()]);

        broadcaster.dispatch(&delta(&[("AAPL", "101.00")]));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dead_connection_does_not_block_others() {
        let (subscriptions, clients, broadcaster) = harness();

        // Connection 1 is dead: its receiver is dropped.
        let rx1 = connect(&clients, 1);
        drop(rx1);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        let mut rx2 = connect(&clients, 2);
        subscriptions.subscribe(2, &["AAPL".to_string()]);

        broadcaster.dispatch(&delta(&[("AAPL", "101.00")]));

        // Connection 2 got its update in the same pass.
        let payload = rx2.try_recv().unwrap();
        assert_eq!(parse_updates(&payload)["AAPL"], 101.0);

        // Connection 1 was torn down everywhere.
        assert!(subscriptions.snapshot_for(1).is_none());
        assert_eq!(clients.count(), 1);
    }

    #[test]
    fn full_queue_drops_the_connection() {
        let (subscriptions, clients, broadcaster) = harness();

        let (tx, _rx) = mpsc::channel(1);
        tx.try_send("stuffed".to_string()).unwrap();
        clients.register(1, tx);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        broadcaster.dispatch(&delta(&[("AAPL", "101.00")]));

        assert!(subscriptions.snapshot_for(1).is_none());
        assert_eq!(clients.count(), 0);
    }

    #[test]
    fn successful_send_records_delivered_price() {
        let (subscriptions, clients, broadcaster) = harness();
        let _rx = connect(&clients, 1);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        broadcaster.dispatch(&delta(&[("AAPL", "101.00")]));

        assert_eq!(subscriptions.last_delivered(1, "AAPL"), Some(dec("101.00")));
    }

    #[test]
    fn sequential_deltas_arrive_in_tick_order() {
        let (subscriptions, clients, broadcaster) = harness();
        let mut rx = connect(&clients, 1);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        broadcaster.dispatch(&delta(&[("AAPL", "101.00")]));
        broadcaster.dispatch(&delta(&[("AAPL", "102.00")]));

        let first = parse_updates(&rx.try_recv().unwrap());
        let second = parse_updates(&rx.try_recv().unwrap());
        assert_eq!(first["AAPL"], 101.0);
        assert_eq!(second["AAPL"], 102.0);
    }

    #[test]
    fn empty_delta_is_a_noop() {
        let (subscriptions, clients, broadcaster) = harness();
        let mut rx = connect(&clients, 1);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        broadcaster.dispatch(&PriceDelta::default());

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn update_message_serializes_numeric_prices() {
        let message = PriceUpdateMessage {
            updates: [("AAPL".to_string(), dec("172.45"))].into_iter().collect(),
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(json["updates"]["AAPL"], 172.45);
    }

    #[tokio::test]
    async fn run_dispatches_from_channel_and_stops_on_cancel() {
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let clients = Arc::new(ClientRegistry::new());
        let (delta_tx, delta_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let (tx, mut rx) = mpsc::channel(8);
        clients.register(1, tx);
        subscriptions.subscribe(1, &["AAPL".to_string()]);

        let broadcaster = FanoutBroadcaster::new(
            Arc::clone(&subscriptions),
            Arc::clone(&clients),
            delta_rx,
            cancel.clone(),
        );
        let handle = tokio::spawn(broadcaster.run());

        delta_tx.send(delta(&[("AAPL", "101.00")])).await.unwrap();
        let payload = rx.recv().await.unwrap();
        assert_eq!(parse_updates(&payload)["AAPL"], 101.0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
