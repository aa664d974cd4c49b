//! Paper-trading engine.
//!
//! Owns the simulated account: one position at most, balance updates on
//! close, a persistent trade ledger, and summary statistics. The same
//! engine drives both the backtester and the live bot.

pub mod engine;
pub mod ledger;
pub mod metrics;
pub mod notifier;
pub mod stats;

pub use engine::{Account, PaperEngine};
pub use ledger::{BalancePoint, Ledger};
pub use metrics::{Gauges, MetricsSnapshot};
pub use notifier::{build_notifier, NoopNotifier, Notifier, SmtpNotifier};
pub use stats::TradeStats;
