//! Swing entry rules.
//!
//! Trades hourly bars in the direction of the 4h trend: EMA alignment
//! plus ADX confirm the trend, a MACD histogram zero cross inside an
//! RSI band triggers the entry, and the bar's volume must exceed its
//! moving average. Stops are ATR-based with a fixed reward multiple.

use bot_core::config::SwingConfig;
use bot_core::{Candle, Side, Signal};
use chrono::{DateTime, Utc};

use crate::indicators::{atr, macd, rsi, sma};
use crate::signal::TrendSnapshot;

/// Hourly momentum reading at one bar.
#[derive(Debug, Clone, Copy)]
pub struct SwingSnapshot {
    pub close: f64,
    pub rsi: f64,
    pub macd_hist: f64,
    pub volume: f64,
    pub volume_sma: f64,
    pub atr: f64,
}

/// Swing indicators computed over a full candle series.
pub struct SwingSeries {
    pub close: Vec<f64>,
    pub rsi: Vec<f64>,
    pub macd_hist: Vec<f64>,
    pub volume: Vec<f64>,
    pub volume_sma: Vec<f64>,
    pub atr: Vec<f64>,
}

impl SwingSeries {
    pub fn compute(candles: &[Candle], cfg: &SwingConfig) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let (_, _, macd_hist) = macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        Self {
            rsi: rsi(&closes, cfg.rsi_period),
            macd_hist,
            volume_sma: sma(&volumes, cfg.volume_sma_period),
            atr: atr(&highs, &lows, &closes, cfg.atr_period),
            close: closes,
            volume: volumes,
        }
    }

    /// Reading at bar `i`, or `None` when any component is undefined.
    pub fn snapshot(&self, i: usize) -> Option<SwingSnapshot> {
        let snap = SwingSnapshot {
            close: *self.close.get(i)?,
            rsi: *self.rsi.get(i)?,
            macd_hist: *self.macd_hist.get(i)?,
            volume: *self.volume.get(i)?,
            volume_sma: *self.volume_sma.get(i)?,
            atr: *self.atr.get(i)?,
        };
        if [
            snap.close,
            snap.rsi,
            snap.macd_hist,
            snap.volume,
            snap.volume_sma,
            snap.atr,
        ]
        .iter()
        .any(|v| v.is_nan())
        {
            return None;
        }
        Some(snap)
    }
}

/// Evaluate the swing rules at one bar. `current` and `previous` are the
/// two most recent closed hourly bars; `trend` is the 4h reading in
/// effect at `current`.
pub fn evaluate_swing_entry(
    trend: &TrendSnapshot,
    current: &SwingSnapshot,
    previous: &SwingSnapshot,
    timestamp: DateTime<Utc>,
    cfg: &SwingConfig,
) -> Option<Signal> {
    // Thin bars carry no conviction regardless of the other conditions.
    if current.volume <= current.volume_sma {
        return None;
    }

    let trending = trend.adx > cfg.adx_threshold;
    let uptrend = trending && trend.ema_fast > trend.ema_slow;
    let downtrend = trending && trend.ema_fast < trend.ema_slow;

    let crossed_up = current.macd_hist > 0.0 && previous.macd_hist <= 0.0;
    let crossed_down = current.macd_hist < 0.0 && previous.macd_hist >= 0.0;

    let rsi_long = current.rsi >= cfg.rsi_long_min && current.rsi <= cfg.rsi_long_max;
    let rsi_short = current.rsi >= cfg.rsi_short_min && current.rsi <= cfg.rsi_short_max;

    let risk = current.atr * cfg.atr_multiplier;

    if uptrend && crossed_up && rsi_long {
        return Some(Signal {
            action: Side::Long,
            entry_price: current.close,
            stop_loss: current.close - risk,
            take_profit: current.close + risk * cfg.reward_multiple,
            timestamp,
            rationale: format!(
                "Uptrend (ADX {:.1}), MACD histogram crossed up, RSI {:.1} in buy band, volume above average",
                trend.adx, current.rsi
            ),
        });
    }

    if downtrend && crossed_down && rsi_short {
        return Some(Signal {
            action: Side::Short,
            entry_price: current.close,
            stop_loss: current.close + risk,
            take_profit: current.close - risk * cfg.reward_multiple,
            timestamp,
            rationale: format!(
                "Downtrend (ADX {:.1}), MACD histogram crossed down, RSI {:.1} in sell band, volume above average",
                trend.adx, current.rsi
            ),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn cfg() -> SwingConfig {
        SwingConfig::default()
    }

    fn up_trend() -> TrendSnapshot {
        TrendSnapshot {
            ema_fast: 110.0,
            ema_slow: 100.0,
            adx: 30.0,
        }
    }

    fn long_setup() -> (SwingSnapshot, SwingSnapshot) {
        let previous = SwingSnapshot {
            close: 99.0,
            rsi: 33.0,
            macd_hist: -0.4,
            volume: 90.0,
            volume_sma: 80.0,
            atr: 2.0,
        };
        let current = SwingSnapshot {
            close: 100.0,
            rsi: 35.0,
            macd_hist: 0.3,
            volume: 120.0,
            volume_sma: 80.0,
            atr: 2.0,
        };
        (current, previous)
    }

    #[test]
    fn test_long_entry_fires() {
        let (current, previous) = long_setup();
        let signal = evaluate_swing_entry(&up_trend(), &current, &previous, ts(), &cfg()).unwrap();
        assert_eq!(signal.action, Side::Long);
        assert_eq!(signal.entry_price, 100.0);
        assert_eq!(signal.stop_loss, 97.0);
        // 2.8 reward on a 3.0 risk
        assert!((signal.take_profit - 108.4).abs() < 1e-9);
        assert!(signal.rationale.contains("MACD histogram crossed up"));
    }

    #[test]
    fn test_short_entry_fires() {
        let trend = TrendSnapshot {
            ema_fast: 90.0,
            ema_slow: 100.0,
            adx: 30.0,
        };
        let previous = SwingSnapshot {
            close: 101.0,
            rsi: 66.0,
            macd_hist: 0.2,
            volume: 100.0,
            volume_sma: 80.0,
            atr: 2.0,
        };
        let current = SwingSnapshot {
            close: 100.0,
            rsi: 65.0,
            macd_hist: -0.3,
            volume: 120.0,
            volume_sma: 80.0,
            atr: 2.0,
        };
        let signal = evaluate_swing_entry(&trend, &current, &previous, ts(), &cfg()).unwrap();
        assert_eq!(signal.action, Side::Short);
        assert_eq!(signal.stop_loss, 103.0);
        assert!((signal.take_profit - 91.6).abs() < 1e-9);
    }

    #[test]
    fn test_thin_volume_blocks_entry() {
        let (mut current, previous) = long_setup();
        current.volume = 80.0;
        current.volume_sma = 80.0;
        assert!(evaluate_swing_entry(&up_trend(), &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_rsi_outside_band_blocks_entry() {
        let (mut current, previous) = long_setup();
        current.rsi = 50.0;
        assert!(evaluate_swing_entry(&up_trend(), &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_no_fresh_cross_blocks_entry() {
        let (current, mut previous) = long_setup();
        // Histogram already positive on the prior bar: no cross event.
        previous.macd_hist = 0.1;
        assert!(evaluate_swing_entry(&up_trend(), &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_weak_adx_blocks_entry() {
        let (current, previous) = long_setup();
        let trend = TrendSnapshot {
            ema_fast: 110.0,
            ema_slow: 100.0,
            adx: 15.0,
        };
        assert!(evaluate_swing_entry(&trend, &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_series_snapshot_requires_all_components() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle {
                timestamp: ts() + chrono::Duration::hours(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        let series = SwingSeries::compute(&candles, &cfg());
        // Far too few bars for the 26-period MACD slow leg.
        assert!(series.snapshot(9).is_none());
        assert!(series.snapshot(100).is_none());
    }
}
