//! Shared foundation for the BTC paper-trading bot.
//!
//! Domain types (candles, signals, positions), the configuration surface,
//! and the error type used across the workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{
    Candle, CandleSeries, ExitReason, Position, PositionStatus, Side, Signal, Timeframe,
};
