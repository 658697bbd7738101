//! WebSocket Connection Gateway
//!
//! Accepts client connections on `/ws/stocks`, parses subscribe and
//! unsubscribe control messages, and relays outbound price updates queued
//! by the fan-out pass.
//!
//! # Per-connection tasks
//!
//! Each connection gets a writer task draining its outbound queue into the
//! socket sink while the reader loop handles control messages. A malformed
//! message earns an error reply and nothing else; the connection stays
//! open. Disconnect (or a writer failure) removes the connection from both
//! the client and subscription registries.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::application::ports::{PortfolioId, PortfolioStoreError};
use crate::application::services::portfolio::PortfolioBridge;
use crate::domain::price::Symbol;
use crate::domain::subscription::{ConnectionId, SubscriptionRegistry};
use crate::infrastructure::fanout::ClientRegistry;
use crate::infrastructure::http::AppState;
use crate::infrastructure::metrics;

/// Outbound queue depth per connection. A consumer this far behind the
/// tick loop is torn down by the fan-out pass.
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

// =============================================================================
// Control Protocol
// =============================================================================

/// A parsed client control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Subscribe to explicit symbols.
    Subscribe(Vec<Symbol>),
    /// Unsubscribe from explicit symbols.
    Unsubscribe(Vec<Symbol>),
    /// Subscribe to the current holdings of a portfolio.
    SubscribePortfolio(PortfolioId),
}

/// A rejected control message. The display text is sent verbatim to the
/// offending connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// Payload is not a JSON object.
    #[error("Invalid message format. Expected JSON object.")]
    InvalidJson,

    /// No string `action` field.
    #[error("Invalid message format. Expected 'action' field.")]
    MissingAction,

    /// No `symbols` array (or non-string elements).
    #[error("Invalid message format. Expected 'symbols' array.")]
    MissingSymbols,

    /// `portfolioId` is not an integer.
    #[error("Invalid message format. Expected integer 'portfolioId'.")]
    InvalidPortfolioId,

    /// Action is neither subscribe nor unsubscribe.
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

/// Parse one inbound control payload.
///
/// # Errors
///
/// Returns a [`ControlError`] whose display text is the reply for the
/// client.
pub fn parse_control(payload: &str) -> Result<ControlCommand, ControlError> {
    let value: Value = serde_json::from_str(payload).map_err(|_| ControlError::InvalidJson)?;
    let object = value.as_object().ok_or(ControlError::InvalidJson)?;

    let action = object
        .get("action")
        .and_then(Value::as_str)
        .ok_or(ControlError::MissingAction)?;

    // The portfolio variant carries no symbols array.
    if action == "subscribe"
        && let Some(portfolio_id) = object.get("portfolioId")
    {
        let portfolio_id = portfolio_id
            .as_i64()
            .ok_or(ControlError::InvalidPortfolioId)?;
        return Ok(ControlCommand::SubscribePortfolio(portfolio_id));
    }

    let symbols = object
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or(ControlError::MissingSymbols)?;
    let symbols: Vec<Symbol> = symbols
        .iter()
        .map(|s| s.as_str().map(ToString::to_string))
        .collect::<Option<_>>()
        .ok_or(ControlError::MissingSymbols)?;

    match action {
        "subscribe" => Ok(ControlCommand::Subscribe(symbols)),
        "unsubscribe" => Ok(ControlCommand::Unsubscribe(symbols)),
        other => Err(ControlError::UnknownAction(other.to_string())),
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Shared collaborators of the connection gateway.
pub struct Gateway {
    subscriptions: Arc<SubscriptionRegistry>,
    clients: Arc<ClientRegistry>,
    portfolio: Arc<PortfolioBridge>,
}

impl Gateway {
    /// Wire the gateway to its registries and the portfolio bridge.
    #[must_use]
    pub fn new(
        subscriptions: Arc<SubscriptionRegistry>,
        clients: Arc<ClientRegistry>,
        portfolio: Arc<PortfolioBridge>,
    ) -> Self {
        Self {
            subscriptions,
            clients,
            portfolio,
        }
    }

    /// Apply one control message for a connection.
    ///
    /// Returns the error text to reply with, if the message was rejected.
    /// State is untouched on any rejection.
    pub async fn handle_control(&self, connection: ConnectionId, payload: &str) -> Option<String> {
        metrics::record_control_message();

        let command = match parse_control(payload) {
            Ok(command) => command,
            Err(e) => {
                metrics::record_parse_error();
                tracing::debug!(connection, error = %e, "Rejected control message");
                return Some(e.to_string());
            }
        };

        match command {
            ControlCommand::Subscribe(symbols) => {
                self.subscriptions.subscribe(connection, &symbols);
                tracing::debug!(connection, count = symbols.len(), "Subscribed symbols");
            }
            ControlCommand::Unsubscribe(symbols) => {
                self.subscriptions.unsubscribe(connection, &symbols);
                tracing::debug!(connection, count = symbols.len(), "Unsubscribed symbols");
            }
            ControlCommand::SubscribePortfolio(portfolio_id) => {
                match self.portfolio.resolve_symbols(portfolio_id).await {
                    Ok(symbols) => {
                        let symbols: Vec<Symbol> = symbols.into_iter().collect();
                        self.subscriptions.subscribe(connection, &symbols);
                        tracing::debug!(
                            connection,
                            portfolio_id,
                            count = symbols.len(),
                            "Subscribed portfolio holdings"
                        );
                    }
                    Err(e @ PortfolioStoreError::NotFound(_)) => {
                        tracing::debug!(connection, portfolio_id, "Portfolio not found");
                        return Some(e.to_string());
                    }
                    Err(e) => {
                        tracing::error!(connection, portfolio_id, error = %e, "Portfolio store read failed");
                        return Some(e.to_string());
                    }
                }
            }
        }

        let stats = self.subscriptions.stats();
        metrics::set_subscribed_symbols(stats.symbol_count as f64);
        None
    }

    /// Register a new connection's outbound queue.
    fn connect(&self, connection: ConnectionId, tx: mpsc::Sender<String>) {
        self.clients.register(connection, tx);
        tracing::info!(connection, "WebSocket connection established");
    }

    /// Tear a connection down from both registries.
    fn disconnect(&self, connection: ConnectionId) {
        self.subscriptions.remove(connection);
        self.clients.remove(connection);
        tracing::info!(connection, "WebSocket connection closed");
    }
}

// =============================================================================
// Axum Handler
// =============================================================================

/// Upgrade handler for `GET /ws/stocks`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let gateway = &state.gateway;
    let connection: ConnectionId = uuid::Uuid::new_v4().as_u64_pair().0;

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    gateway.connect(connection, outbound_tx);

    let (mut sink, mut stream) = socket.split();

    // Writer: single drain of the outbound queue keeps per-connection
    // updates in tick order.
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(reply) = gateway.handle_control(connection, text.as_str()).await
                    && gateway.clients.send(connection, reply).is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
        }
    }

    // Dropping the queue sender ends the writer task.
    gateway.disconnect(connection);
    let _ = writer.await;
}

// =============================================================================
// Tests
// =============================================================================
