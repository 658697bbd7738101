//! Historical OHLCV Data
//!
//! Generates a year of synthetic daily bars per symbol at startup and keeps
//! them in memory for the REST history endpoint. The close of the final
//! generated bar doubles as the symbol's live seed price, so the stream
//! continues exactly where the history leaves off.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::price::Symbol;
use crate::domain::stock::StockListing;

/// Days of history generated per symbol.
pub const HISTORY_DAYS: u64 = 365;

/// Daily variation cap as a fraction of the base price.
const VARIATION_FRACTION: f64 = 0.1;

// =============================================================================
// Model
// =============================================================================

/// One synthetic daily bar.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalPrice {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price, 2 dp.
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    /// Closing price, 2 dp.
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    /// Daily high, 2 dp.
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    /// Daily low, 2 dp.
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    /// Shares traded.
    pub volume: i64,
}

/// The history payload for one symbol, bars ascending by date.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeries {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Daily bars, oldest first.
    pub history: Vec<TimeSeriesBar>,
}

/// One bar of a [`TimeSeries`], without the symbol repeated.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesBar {
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price.
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    /// Closing price.
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    /// Daily high.
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    /// Daily low.
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    /// Shares traded.
    pub volume: i64,
}

// =============================================================================
// Generation
// =============================================================================

fn round2(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Generate `days` daily bars for one symbol, dates descending from `today`.
///
/// Open and close straddle the base price by a random variation of up to
/// 10%, with high and low pushed one variation beyond them.
pub fn generate_history<R: Rng + ?Sized>(
    symbol: &str,
    base_price: Decimal,
    today: NaiveDate,
    days: u64,
    rng: &mut R,
) -> Vec<HistoricalPrice> {
    use rust_decimal::prelude::ToPrimitive;

    let base = base_price.to_f64().unwrap_or_default();
    let mut bars = Vec::with_capacity(usize::try_from(days).unwrap_or_default());

    for offset in 0..days {
        let Some(date) = today.checked_sub_days(Days::new(offset)) else {
            break;
        };

        let variation = base * rng.random::<f64>() * VARIATION_FRACTION;
        let open = base - variation;
        let close = base + variation;
        let high = open.max(close) + variation;
        let low = open.min(close) - variation;

        bars.push(HistoricalPrice {
            symbol: symbol.to_string(),
            date,
            open: round2(open),
            close: round2(close),
            high: round2(high),
            low: round2(low),
            volume: rng.random_range(1000..10_000),
        });
    }

    bars
}

// =============================================================================
// Repository
// =============================================================================

/// In-memory store of generated history, built once at startup.
#[derive(Debug, Default)]
pub struct HistoryRepository {
    by_symbol: HashMap<Symbol, Vec<HistoricalPrice>>,
}

impl HistoryRepository {
    /// Generate history for every listing.
    ///
    /// Returns the repository together with each symbol's live seed price,
    /// the close of its final generated bar.
    pub fn generate<R: Rng + ?Sized>(
        listings: &[StockListing],
        rng: &mut R,
    ) -> (Self, HashMap<Symbol, Decimal>) {
        let today = Utc::now().date_naive();
        let mut by_symbol = HashMap::with_capacity(listings.len());
        let mut seeds = HashMap::with_capacity(listings.len());

        for listing in listings {
            let bars = generate_history(&listing.symbol, listing.seed_price, today, HISTORY_DAYS, rng);
            let seed = bars.last().map_or(listing.seed_price, |bar| bar.close);
            seeds.insert(listing.symbol.clone(), seed);
            by_symbol.insert(listing.symbol.clone(), bars);
        }

        tracing::info!(
            symbols = listings.len(),
            days = HISTORY_DAYS,
            "Historical data generated"
        );
        (Self { by_symbol }, seeds)
    }

    /// The time series for a symbol, bars ascending by date.
    #[must_use]
    pub fn time_series(&self, symbol: &str) -> Option<TimeSeries> {
        let bars = self.by_symbol.get(symbol)?;
        let mut history: Vec<TimeSeriesBar> = bars
            .iter()
            .map(|bar| TimeSeriesBar {
                date: bar.date,
                open: bar.open,
                close: bar.close,
                high: bar.high,
                low: bar.low,
                volume: bar.volume,
            })
            .collect();
        history.sort_by_key(|bar| bar.date);

        Some(TimeSeries {
            symbol: symbol.to_string(),
            history,
        })
    }

    /// Number of symbols with generated history.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.by_symbol.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
