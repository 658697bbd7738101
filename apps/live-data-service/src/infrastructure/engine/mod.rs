//! Price Engine Tick Loop
//!
//! Drives the price book on a fixed interval and publishes each tick's
//! delta onto the fan-out channel. Runs on its own task; connection I/O
//! never delays a tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::price::{PriceBook, PriceDelta};
use crate::infrastructure::metrics;

// =============================================================================
// Engine State Tracking
// =============================================================================

/// Tracks the tick loop's progress for health reporting.
#[derive(Debug, Default)]
pub struct EngineState {
    ticks: AtomicU64,
    last_tick_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
}

impl EngineState {
    /// Create a fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed tick.
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick_at.write() = Some(Utc::now());
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// When the last tick completed, if any.
    #[must_use]
    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        *self.last_tick_at.read()
    }

    /// Whether at least one tick has completed.
    #[must_use]
    pub fn has_ticked(&self) -> bool {
        self.tick_count() > 0
    }
}

// =============================================================================
// Price Engine
// =============================================================================

/// Periodic driver of the price book.
pub struct PriceEngine {
    book: Arc<PriceBook>,
    delta_tx: mpsc::Sender<PriceDelta>,
    state: Arc<EngineState>,
    cancel: CancellationToken,
}

impl PriceEngine {
    /// Create an engine publishing deltas onto `delta_tx`.
    #[must_use]
    pub fn new(
        book: Arc<PriceBook>,
        delta_tx: mpsc::Sender<PriceDelta>,
        state: Arc<EngineState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            book,
            delta_tx,
            state,
            cancel,
        }
    }

    /// Run the tick loop until cancelled.
    ///
    /// The first tick fires after one full interval, matching the configured
    /// update frequency from the start.
    pub async fn run(self) {
        self.run_with_rng(StdRng::from_os_rng()).await;
    }

    /// Run the tick loop with a caller-supplied RNG (deterministic in tests).
    pub async fn run_with_rng<R: Rng + Send>(self, mut rng: R) {
        let mut interval = tokio::time::interval(self.book.params().tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; consume the initial tick.
        interval.tick().await;

        tracing::info!(
            tick_interval_secs = self.book.params().tick_interval.as_secs_f64(),
            symbols = self.book.symbol_count(),
            "Price engine started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Price engine cancelled");
                    return;
                }
                _ = interval.tick() => {
                    if !self.advance(&mut rng).await {
                        return;
                    }
                }
            }
        }
    }

    /// Compute one tick and publish its delta.
    ///
    /// Returns `false` once the fan-out side is gone.
    async fn advance<R: Rng>(&self, rng: &mut R) -> bool {
        let started = Instant::now();
        let delta = self.book.tick(rng);
        self.state.record_tick();

        metrics::record_tick(started.elapsed());
        tracing::debug!(
            symbols = delta.updates.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Tick computed"
        );

        if self.delta_tx.send(delta).await.is_err() {
            tracing::info!("Delta channel closed, price engine stopping");
            return false;
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::price::SimulationParams;

    fn test_book(tick_interval: Duration) -> Arc<PriceBook> {
        let params = SimulationParams {
            tick_interval,
            ..SimulationParams::default()
        };
        let seeds: HashMap<_, _> = [("AAPL".to_string(), Decimal::new(10000, 2))]
            .into_iter()
            .collect();
        Arc::new(PriceBook::new(params, seeds))
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_a_delta_each_tick() {
        let book = test_book(Duration::from_secs(5));
        let (tx, mut rx) = mpsc::channel(8);
        let state = Arc::new(EngineState::new());
        let cancel = CancellationToken::new();

        let engine = PriceEngine::new(Arc::clone(&book), tx, Arc::clone(&state), cancel.clone());
        let handle = tokio::spawn(engine.run_with_rng(StdRng::seed_from_u64(1)));

        let delta = rx.recv().await.unwrap();
        assert!(delta.updates.contains_key("AAPL"));
        assert!(state.tick_count() >= 1);

        rx.recv().await.unwrap();
        assert!(state.tick_count() >= 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_delta_channel_closes() {
        let book = test_book(Duration::from_secs(1));
        let (tx, rx) = mpsc::channel(8);
        let state = Arc::new(EngineState::new());

        let engine = PriceEngine::new(book, tx, state, CancellationToken::new());
        let handle = tokio::spawn(engine.run_with_rng(StdRng::seed_from_u64(1)));

        drop(rx);
        tokio::time::advance(Duration::from_secs(1)).await;
        handle.await.unwrap();
    }

    #[test]
    fn engine_state_tracks_ticks() {
        let state = EngineState::new();
        assert!(!state.has_ticked());
        assert!(state.last_tick_at().is_none());

        state.record_tick();

        assert!(state.has_ticked());
        assert_eq!(state.tick_count(), 1);
        assert!(state.last_tick_at().is_some());
    }
}
