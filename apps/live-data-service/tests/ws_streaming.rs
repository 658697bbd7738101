//! WebSocket Streaming Integration Tests
//!
//! Exercises the full server surface with real WebSocket clients: the
//! control protocol, filtered delivery, portfolio subscriptions, and fault
//! isolation between connections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use live_data_service::infrastructure::http::router;
use live_data_service::{
    AppState, ClientRegistry, EngineState, FanoutBroadcaster, Gateway, HistoryRepository,
    InMemoryPortfolioStore, PortfolioBridge, PriceBook, PriceDelta, PriceEngine,
    SimulationParams, SubscriptionRegistry, default_universe,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

struct TestServer {
    ws_url: String,
    delta_tx: mpsc::Sender<PriceDelta>,
    subscriptions: Arc<SubscriptionRegistry>,
    cancel: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

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

async fn setup_test_server() -> TestServer {
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let clients = Arc::new(ClientRegistry::new());

    let store = Arc::new(InMemoryPortfolioStore::new());
    store.insert(7, vec!["GOOGL".to_string(), "MSFT".to_string()]);
    let portfolio = Arc::new(PortfolioBridge::new(store as _));

    let gateway = Gateway::new(Arc::clone(&subscriptions), Arc::clone(&clients), portfolio);

    let universe = default_universe();
    let (history, _seeds) =
        HistoryRepository::generate(&universe, &mut StdRng::seed_from_u64(1));

    let state = Arc::new(AppState::new(
        "test-0.0.1".to_string(),
        gateway,
        Arc::new(EngineState::new()),
        Arc::clone(&subscriptions),
        Arc::clone(&clients),
        universe,
        Arc::new(history),
    ));

    let cancel = CancellationToken::new();

    let (delta_tx, delta_rx) = mpsc::channel(16);
    let broadcaster = FanoutBroadcaster::new(
        Arc::clone(&subscriptions),
        Arc::clone(&clients),
        delta_rx,
        cancel.clone(),
    );
    tokio::spawn(broadcaster.run());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = router(state);
    let serve_cancel = cancel.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(serve_cancel.cancelled_owned())
            .await
            .unwrap();
    });

    TestServer {
        ws_url: format!("ws://{addr}/ws/stocks"),
        delta_tx,
        subscriptions,
        cancel,
    }
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(server: &TestServer) -> WsClient {
    let (ws, _response) = tokio_tungstenite::connect_async(server.ws_url.as_str())
        .await
        .unwrap();
    ws
}

async fn recv_text(ws: &mut WsClient) -> String {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return text.to_string();
        }
    }
}

fn parse_updates(payload: &str) -> HashMap<String, f64> {
    let value: serde_json::Value = serde_json::from_str(payload).unwrap();
    value["updates"]
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), v.as_f64().unwrap()))
        .collect()
}

/// Wait until the server has registered `count` subscribed connections.
async fn wait_for_subscribers(server: &TestServer, count: usize) {
    for _ in 0..100 {
        if server.subscriptions.stats().connection_count >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never reached {count} subscribed connections");
}

// =============================================================================
// Control Protocol Tests
// =============================================================================

#[tokio::test]
async fn subscribe_then_receive_only_subscribed_symbols() {
    let server = setup_test_server().await;
    let mut ws = connect(&server).await;

    ws.send(Message::text(
        r#"{"action": "subscribe", "symbols": ["AAPL"]}"#,
    ))
    .await
    .unwrap();
    wait_for_subscribers(&server, 1).await;

    server
        .delta_tx
        .send(delta(&[("AAPL", "101.00"), ("GOOGL", "2840.10")]))
        .await
        .unwrap();

    let updates = parse_updates(&recv_text(&mut ws).await);
    assert_eq!(updates.get("AAPL"), Some(&101.0));
    assert!(!updates.contains_key("GOOGL"));
}

#[tokio::test]
async fn unknown_action_gets_error_reply() {
    let server = setup_test_server().await;
    let mut ws = connect(&server).await;

    ws.send(Message::text(r#"{"action": "foo", "symbols": ["AAPL"]}"#))
        .await
        .unwrap();

    assert_eq!(recv_text(&mut ws).await, "Unknown action: foo");
}

#[tokio::test]
async fn malformed_payload_keeps_connection_usable() {
    let server = setup_test_server().await;
    let mut ws = connect(&server).await;

    ws.send(Message::text("not json")).await.unwrap();
    assert_eq!(
        recv_text(&mut ws).await,
        "Invalid message format. Expected JSON object."
    );

    ws.send(Message::text(r#"{"action": "subscribe"}"#))
        .await
        .unwrap();
    assert_eq!(
        recv_text(&mut ws).await,
        "Invalid message format. Expected 'symbols' array."
    );

    // The connection still works after rejected messages.
    ws.send(Message::text(
        r#"{"action": "subscribe", "symbols": ["MSFT"]}"#,
    ))
    .await
    .unwrap();
    wait_for_subscribers(&server, 1).await;

    server
        .delta_tx
        .send(delta(&[("MSFT", "420.00")]))
        .await
        .unwrap();

    let updates = parse_updates(&recv_text(&mut ws).await);
    assert_eq!(updates.get("MSFT"), Some(&420.0));
}

#[tokio::test]
async fn unsubscribe_stops_delivery_for_that_symbol() {
    let server = setup_test_server().await;
    let mut ws = connect(&server).await;

    ws.send(Message::text(
        r#"{"action": "subscribe", "symbols": ["AAPL", "MSFT"]}"#,
    ))
    .await
    .unwrap();
    wait_for_subscribers(&server, 1).await;

    ws.send(Message::text(
        r#"{"action": "unsubscribe", "symbols": ["AAPL"]}"#,
    ))
    .await
    .unwrap();

    // Wait until the unsubscribe has been applied.
    for _ in 0..100 {
        if server.subscriptions.stats().symbol_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    server
        .delta_tx
        .send(delta(&[("AAPL", "101.00"), ("MSFT", "420.00")]))
        .await
        .unwrap();

    let updates = parse_updates(&recv_text(&mut ws).await);
    assert!(!updates.contains_key("AAPL"));
    assert_eq!(updates.get("MSFT"), Some(&420.0));
}

// =============================================================================
// Portfolio Subscription Tests
// =============================================================================

#[tokio::test]
async fn portfolio_subscribe_streams_its_holdings() {
    let server = setup_test_server().await;
    let mut ws = connect(&server).await;

    ws.send(Message::text(r#"{"action": "subscribe", "portfolioId": 7}"#))
        .await
        .unwrap();
    wait_for_subscribers(&server, 1).await;

    server
        .delta_tx
        .send(delta(&[("GOOGL", "2900.00"), ("AAPL", "101.00")]))
        .await
        .unwrap();

    let updates = parse_updates(&recv_text(&mut ws).await);
    assert_eq!(updates.get("GOOGL"), Some(&2900.0));
    assert!(!updates.contains_key("AAPL"));
}

#[tokio::test]
async fn unknown_portfolio_gets_not_found_reply() {
    let server = setup_test_server().await;
    let mut ws = connect(&server).await;

    ws.send(Message::text(r#"{"action": "subscribe", "portfolioId": 99}"#))
        .await
        .unwrap();

    assert_eq!(recv_text(&mut ws).await, "Portfolio not found with ID: 99");
}

// =============================================================================
// Fault Isolation Tests
// =============================================================================

#[tokio::test]
async fn dropped_client_does_not_disturb_others() {
    let server = setup_test_server().await;

    let mut ws1 = connect(&server).await;
    ws1.send(Message::text(
        r#"{"action": "subscribe", "symbols": ["AAPL"]}"#,
    ))
    .await
    .unwrap();
    wait_for_subscribers(&server, 1).await;

    let mut ws2 = connect(&server).await;
    ws2.send(Message::text(
        r#"{"action": "subscribe", "symbols": ["AAPL"]}"#,
    ))
    .await
    .unwrap();
    wait_for_subscribers(&server, 2).await;

    // Client 1 vanishes without a close handshake.
    drop(ws1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    server
        .delta_tx
        .send(delta(&[("AAPL", "101.00")]))
        .await
        .unwrap();

    let updates = parse_updates(&recv_text(&mut ws2).await);
    assert_eq!(updates.get("AAPL"), Some(&101.0));
}

// =============================================================================
// Full Pipeline Test
// =============================================================================

#[tokio::test]
async fn engine_ticks_reach_a_subscribed_client() {
    let server = setup_test_server().await;

    // Drive the real engine into the broadcaster at a fast tick.
    let params = SimulationParams {
        tick_interval: Duration::from_millis(50),
        ..SimulationParams::default()
    };
    let seeds: HashMap<String, Decimal> =
        [("AAPL".to_string(), dec("100.00"))].into_iter().collect();
    let book = Arc::new(PriceBook::new(params, seeds));
    let engine = PriceEngine::new(
        book,
        server.delta_tx.clone(),
        Arc::new(EngineState::new()),
        server.cancel.clone(),
    );
    tokio::spawn(engine.run());

    let mut ws = connect(&server).await;
    ws.send(Message::text(
        r#"{"action": "subscribe", "symbols": ["AAPL"]}"#,
    ))
    .await
    .unwrap();
    wait_for_subscribers(&server, 1).await;

    let updates = parse_updates(&recv_text(&mut ws).await);
    let price = updates["AAPL"];
    assert!(price > 0.0, "price must stay above the floor: {price}");
}
