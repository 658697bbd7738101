//! Configuration Module
//!
//! Configuration loading and validation for the live data service.

mod settings;

pub use settings::{ConfigError, ServerSettings, ServiceConfig, SimulationSettings};
