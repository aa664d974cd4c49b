//! Strategy layer: indicator math and the entry rule kernels.
//!
//! Indicators are computed over full price series and return vectors
//! aligned with the input, with NaN in positions where the indicator
//! is not yet defined. The signal module consumes snapshots of those
//! vectors so the same rules serve both backtesting and live trading.

pub mod indicators;
pub mod signal;
pub mod swing;

pub use signal::{
    evaluate_entry, MomentumSeries, MomentumSnapshot, RuleSet, SignalEngine, TrendSeries,
    TrendSnapshot,
};
pub use swing::{evaluate_swing_entry, SwingSeries, SwingSnapshot};
