//! Service Configuration Settings
//!
//! Configuration types for the live data service, loaded from environment
//! variables. Any malformed or out-of-range value is fatal at startup; the
//! service refuses to run a simulation it cannot trust.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::price::SimulationParams;
use crate::domain::stock::{StockListing, default_universe};

/// Simulation parameter settings.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Interval between price updates.
    pub tick_interval: Duration,
    /// Expected drift over one timeframe, as a fraction.
    pub drift_pct: f64,
    /// Volatility over one timeframe, as a fraction.
    pub volatility_pct: f64,
    /// The timeframe drift and volatility are quoted against.
    pub timeframe: Duration,
    /// Absolute floor no price falls below.
    pub price_floor: Decimal,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let params = SimulationParams::default();
        Self {
            tick_interval: params.tick_interval,
            drift_pct: params.drift_pct,
            volatility_pct: params.volatility_pct,
            timeframe: params.timeframe,
            price_floor: params.price_floor,
        }
    }
}

impl SimulationSettings {
    /// Convert into the domain's parameter struct.
    #[must_use]
    pub const fn to_params(&self) -> SimulationParams {
        SimulationParams {
            tick_interval: self.tick_interval,
            drift_pct: self.drift_pct,
            volatility_pct: self.volatility_pct,
            timeframe: self.timeframe,
            price_floor: self.price_floor,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP and WebSocket port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Simulation parameters.
    pub simulation: SimulationSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Seed price overrides parsed from `LIVE_DATA_SYMBOLS`, if set.
    pub symbol_overrides: Option<Vec<(String, Decimal)>>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any variable is present but malformed,
    /// or if the resulting parameters fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SimulationSettings::default();

        let simulation = SimulationSettings {
            tick_interval: parse_env_duration_secs(
                "LIVE_DATA_TICK_INTERVAL_SECS",
                defaults.tick_interval,
            )?,
            drift_pct: parse_env_f64("LIVE_DATA_DRIFT_PCT", defaults.drift_pct)?,
            volatility_pct: parse_env_f64("LIVE_DATA_VOLATILITY_PCT", defaults.volatility_pct)?,
            timeframe: parse_env_duration_secs("LIVE_DATA_TIMEFRAME_SECS", defaults.timeframe)?,
            price_floor: parse_env_decimal("LIVE_DATA_PRICE_FLOOR", defaults.price_floor)?,
        };

        let server = ServerSettings {
            port: parse_env_u16("LIVE_DATA_PORT", ServerSettings::default().port)?,
        };

        let symbol_overrides = match std::env::var("LIVE_DATA_SYMBOLS") {
            Ok(raw) => Some(parse_symbol_overrides(&raw)?),
            Err(_) => None,
        };

        let config = Self {
            simulation,
            server,
            symbol_overrides,
        };
        config.validate()?;
        Ok(config)
    }

    /// The stock universe this configuration describes.
    ///
    /// Starts from the built-in universe; overrides replace the seed price
    /// of known symbols and add bare listings for new ones.
    #[must_use]
    pub fn universe(&self) -> Vec<StockListing> {
        let mut universe = default_universe();

        if let Some(overrides) = &self.symbol_overrides {
            for (symbol, seed_price) in overrides {
                if let Some(listing) = universe.iter_mut().find(|l| l.symbol == *symbol) {
                    listing.seed_price = *seed_price;
                } else {
                    universe.push(StockListing::custom(symbol, *seed_price));
                }
            }
        }

        universe
    }

    /// Validate parameter ranges, including the floor against every seed.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;

        if sim.tick_interval.is_zero() {
            return Err(ConfigError::NonPositive("LIVE_DATA_TICK_INTERVAL_SECS"));
        }
        if sim.timeframe.is_zero() {
            return Err(ConfigError::NonPositive("LIVE_DATA_TIMEFRAME_SECS"));
        }
        if sim.volatility_pct <= 0.0 || !sim.volatility_pct.is_finite() {
            return Err(ConfigError::NonPositive("LIVE_DATA_VOLATILITY_PCT"));
        }
        if !sim.drift_pct.is_finite() {
            return Err(ConfigError::NotFinite("LIVE_DATA_DRIFT_PCT"));
        }
        if sim.price_floor <= Decimal::ZERO {
            return Err(ConfigError::NonPositive("LIVE_DATA_PRICE_FLOOR"));
        }

        for listing in self.universe() {
            if listing.seed_price <= sim.price_floor {
                return Err(ConfigError::FloorAboveSeed {
                    symbol: listing.symbol,
                    floor: sim.price_floor,
                    seed: listing.seed_price,
                });
            }
        }

        Ok(())
    }
}

/// Parse a `SYMBOL:PRICE,SYMBOL:PRICE` override list.
fn parse_symbol_overrides(raw: &str) -> Result<Vec<(String, Decimal)>, ConfigError> {
    let mut overrides = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (symbol, price) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidSymbolOverride(entry.to_string()))?;
        let symbol = symbol.trim();
        let price: Decimal = price
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidSymbolOverride(entry.to_string()))?;

        if symbol.is_empty() || price <= Decimal::ZERO {
            return Err(ConfigError::InvalidSymbolOverride(entry.to_string()));
        }
        overrides.push((symbol.to_string(), price));
    }

    Ok(overrides)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but not parseable.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// The variable name.
        key: &'static str,
        /// The rejected raw value.
        value: String,
    },
    /// A value that must be positive is zero or negative.
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    /// A value that must be finite is NaN or infinite.
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    /// A `LIVE_DATA_SYMBOLS` entry is not `SYMBOL:PRICE` with a positive price.
    #[error("invalid symbol override entry: {0}")]
    InvalidSymbolOverride(String),
    /// The price floor is at or above a symbol's seed price.
    #[error("price floor {floor} is not below seed price {seed} for {symbol}")]
    FloorAboveSeed {
        /// The offending symbol.
        symbol: String,
        /// Configured floor.
        floor: Decimal,
        /// The symbol's seed price.
        seed: Decimal,
    },
}

fn parse_env_u16(key: &'static str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_env_f64(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_env_decimal(key: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_env_duration_secs(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}
