//! Backtester
//!
//! Deterministic historical replay of the trading strategy: load OHLCV
//! data from CSV, resample the context timeframe, and run the same
//! engine and entry rules the live bot uses over every bar in order.

pub mod data;
pub mod runner;

pub use data::{load_candles_csv, resample};
pub use runner::{run_backtest, BacktestResult};
