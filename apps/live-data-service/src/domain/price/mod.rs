//! Price Simulation Types
//!
//! Domain types for the simulated price book: the authoritative current
//! price per tracked symbol and the stochastic update applied on each tick.
//!
//! # Design
//!
//! The price book holds an immutable snapshot (`Arc<HashMap>`) that is
//! rebuilt and swapped atomically on every tick. Readers (the fan-out pass,
//! REST handlers) clone the `Arc` and never observe a half-written tick.
//!
//! The tick applies geometric Brownian motion per symbol:
//!
//! ```text
//! drift_per_tick      = (drift_pct / timeframe_secs) * tick_secs
//! volatility_per_tick = volatility_pct * sqrt(tick_secs / timeframe_secs)
//! new_price           = current * (1 + drift_per_tick + z * volatility_per_tick)
//! ```
//!
//! where `z` is a standard normal draw. Prices are rounded to 2 decimals
//! (half-up) and floored at a configured minimum.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use rand_distr::StandardNormal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

// =============================================================================
// Types
// =============================================================================

/// A stock ticker symbol.
pub type Symbol = String;

/// Price changes produced by one tick: symbol to new price, for every
/// symbol successfully recomputed this tick. Ephemeral; consumed by one
/// fan-out pass and dropped.
#[derive(Debug, Clone, Default)]
pub struct PriceDelta {
    /// New price per symbol.
    pub updates: HashMap<Symbol, Decimal>,
}

impl PriceDelta {
    /// Check whether any symbol changed this tick.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

// =============================================================================
// Simulation Parameters
// =============================================================================

/// Parameters of the stochastic price process.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    /// Interval between price updates.
    pub tick_interval: Duration,
    /// Drift over the reference timeframe (e.g. 0.02 = +2%).
    pub drift_pct: f64,
    /// Volatility over the reference timeframe (e.g. 0.05 = 5%).
    pub volatility_pct: f64,
    /// Reference timeframe the drift/volatility percentages apply to.
    pub timeframe: Duration,
    /// Lowest price a symbol can reach.
    pub price_floor: Decimal,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            drift_pct: 0.02,
            volatility_pct: 0.05,
            timeframe: Duration::from_secs(3600),
            price_floor: Decimal::new(1, 2), // 0.01
        }
    }
}

impl SimulationParams {
    /// Drift applied per tick, scaled from the reference timeframe.
    #[must_use]
    pub fn drift_per_tick(&self) -> f64 {
        (self.drift_pct / self.timeframe.as_secs_f64()) * self.tick_interval.as_secs_f64()
    }

    /// Volatility applied per tick, scaled by sqrt of the time ratio.
    #[must_use]
    pub fn volatility_per_tick(&self) -> f64 {
        self.volatility_pct * (self.tick_interval.as_secs_f64() / self.timeframe.as_secs_f64()).sqrt()
    }
}

// =============================================================================
// Price Book
// =============================================================================

/// Authoritative current price per tracked symbol.
///
/// Exclusively mutated by the tick loop; safe to read concurrently from any
/// task via [`PriceBook::snapshot`].
pub struct PriceBook {
    params: SimulationParams,
    prices: RwLock<Arc<HashMap<Symbol, Decimal>>>,
}

impl PriceBook {
    /// Create a price book seeded with starting prices.
    #[must_use]
    pub fn new(params: SimulationParams, seeds: HashMap<Symbol, Decimal>) -> Self {
        Self {
            params,
            prices: RwLock::new(Arc::new(seeds)),
        }
    }

    /// Get a consistent point-in-time view of all prices.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HashMap<Symbol, Decimal>> {
        Arc::clone(&self.prices.read())
    }

    /// Current price of one symbol, if tracked.
    #[must_use]
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.read().get(symbol).copied()
    }

    /// Number of tracked symbols.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.prices.read().len()
    }

    /// The simulation parameters this book was built with.
    #[must_use]
    pub const fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Advance every symbol one tick and swap in the new snapshot.
    ///
    /// A symbol whose change cannot be represented (non-finite draw) keeps
    /// its previous price and is excluded from the returned delta; the rest
    /// of the tick proceeds.
    pub fn tick<R: Rng + ?Sized>(&self, rng: &mut R) -> PriceDelta {
        let drift = self.params.drift_per_tick();
        let volatility = self.params.volatility_per_tick();

        let current = self.snapshot();
        let mut next = HashMap::with_capacity(current.len());
        let mut updates = HashMap::with_capacity(current.len());

        for (symbol, &price) in current.iter() {
            let z: f64 = rng.sample(StandardNormal);
            let total_change = drift + z * volatility;

            match next_price(price, total_change, self.params.price_floor) {
                Some(new_price) => {
                    next.insert(symbol.clone(), new_price);
                    updates.insert(symbol.clone(), new_price);
                }
                None => {
                    tracing::warn!(symbol = %symbol, total_change, "Skipping unrepresentable price change");
                    next.insert(symbol.clone(), price);
                }
            }
        }

        *self.prices.write() = Arc::new(next);
        PriceDelta { updates }
    }
}

/// Compute the next price from a fractional change, rounded to 2 decimals
/// half-up and floored.
///
/// Returns `None` if the change is not representable as a decimal.
#[must_use]
pub fn next_price(current: Decimal, total_change: f64, floor: Decimal) -> Option<Decimal> {
    let change = Decimal::from_f64(total_change)?;
    let new_price = current
        .checked_mul(Decimal::ONE + change)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Some(new_price.max(floor))
}

// =============================================================================
// Tests
// =============================================================================
