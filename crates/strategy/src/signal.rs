//! Day-trading entry rules and rule-set dispatch.
//!
//! The day-trading rules trade the execution timeframe in the direction
//! of the higher-timeframe trend: EMA alignment plus ADX confirm the
//! trend, a Stochastic RSI cross inside its extreme zone triggers the
//! entry, and RSI plus the long execution EMA act as sanity filters.
//! Stops are ATR-based with a fixed reward multiple. [`RuleSet`] selects
//! between these rules and the swing rules in [`crate::swing`] based on
//! configuration.

use bot_core::config::{StrategyConfig, StrategyKind};
use bot_core::{Candle, CandleSeries, Side, Signal};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::indicators::{adx, atr, ema, rsi, stoch_rsi};
use crate::swing::{evaluate_swing_entry, SwingSeries};

/// Higher-timeframe trend reading at one bar.
#[derive(Debug, Clone, Copy)]
pub struct TrendSnapshot {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub adx: f64,
}

/// Execution-timeframe momentum reading at one bar.
#[derive(Debug, Clone, Copy)]
pub struct MomentumSnapshot {
    pub close: f64,
    pub ema_trend: f64,
    pub rsi: f64,
    pub atr: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
}

/// Trend indicators computed over a full candle series.
pub struct TrendSeries {
    pub ema_fast: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub adx: Vec<f64>,
}

impl TrendSeries {
    pub fn compute(
        candles: &[Candle],
        fast_period: usize,
        slow_period: usize,
        adx_period: usize,
    ) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        Self {
            ema_fast: ema(&closes, fast_period),
            ema_slow: ema(&closes, slow_period),
            adx: adx(&highs, &lows, &closes, adx_period),
        }
    }

    /// Reading at bar `i`, or `None` when any component is undefined.
    pub fn snapshot(&self, i: usize) -> Option<TrendSnapshot> {
        let ema_fast = *self.ema_fast.get(i)?;
        let ema_slow = *self.ema_slow.get(i)?;
        let adx = *self.adx.get(i)?;
        if ema_fast.is_nan() || ema_slow.is_nan() || adx.is_nan() {
            return None;
        }
        Some(TrendSnapshot {
            ema_fast,
            ema_slow,
            adx,
        })
    }
}

/// Momentum indicators computed over a full candle series.
pub struct MomentumSeries {
    pub close: Vec<f64>,
    pub ema_trend: Vec<f64>,
    pub rsi: Vec<f64>,
    pub atr: Vec<f64>,
    pub stoch_k: Vec<f64>,
    pub stoch_d: Vec<f64>,
}

impl MomentumSeries {
    pub fn compute(candles: &[Candle], cfg: &StrategyConfig) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let (stoch_k, stoch_d) = stoch_rsi(
            &closes,
            cfg.stoch_rsi_period,
            cfg.stoch_period,
            cfg.stoch_k,
            cfg.stoch_d,
        );
        Self {
            ema_trend: ema(&closes, cfg.ema_trend_period),
            rsi: rsi(&closes, cfg.rsi_period),
            atr: atr(&highs, &lows, &closes, cfg.atr_period),
            stoch_k,
            stoch_d,
            close: closes,
        }
    }

    /// Reading at bar `i`, or `None` when any component is undefined.
    pub fn snapshot(&self, i: usize) -> Option<MomentumSnapshot> {
        let close = *self.close.get(i)?;
        let ema_trend = *self.ema_trend.get(i)?;
        let rsi = *self.rsi.get(i)?;
        let atr = *self.atr.get(i)?;
        let stoch_k = *self.stoch_k.get(i)?;
        let stoch_d = *self.stoch_d.get(i)?;
        let snap = MomentumSnapshot {
            close,
            ema_trend,
            rsi,
            atr,
            stoch_k,
            stoch_d,
        };
        if [close, ema_trend, rsi, atr, stoch_k, stoch_d]
            .iter()
            .any(|v| v.is_nan())
        {
            return None;
        }
        Some(snap)
    }
}

/// Evaluate the entry rules at one bar. `current` and `previous` are the
/// two most recent closed execution bars; `trend` is the context-timeframe
/// reading in effect at `current`.
pub fn evaluate_entry(
    trend: &TrendSnapshot,
    current: &MomentumSnapshot,
    previous: &MomentumSnapshot,
    timestamp: DateTime<Utc>,
    cfg: &StrategyConfig,
) -> Option<Signal> {
    let trending = trend.adx > cfg.adx_threshold;
    let uptrend = trending && trend.ema_fast > trend.ema_slow;
    let downtrend = trending && trend.ema_fast < trend.ema_slow;

    let crossed_up = previous.stoch_k <= previous.stoch_d && current.stoch_k > current.stoch_d;
    let crossed_down = previous.stoch_k >= previous.stoch_d && current.stoch_k < current.stoch_d;

    let risk = current.atr * cfg.atr_multiplier;

    if uptrend
        && crossed_up
        && current.stoch_k < cfg.stoch_oversold
        && current.rsi < cfg.rsi_long_max
        && current.close > current.ema_trend
    {
        return Some(Signal {
            action: Side::Long,
            entry_price: current.close,
            stop_loss: current.close - risk,
            take_profit: current.close + risk * cfg.reward_multiple,
            timestamp,
            rationale: format!(
                "Uptrend (ADX {:.1}), StochRSI cross up at {:.1}, RSI {:.1}, price above EMA{}",
                trend.adx, current.stoch_k, current.rsi, cfg.ema_trend_period
            ),
        });
    }

    if downtrend
        && crossed_down
        && current.stoch_k > cfg.stoch_overbought
        && current.rsi > cfg.rsi_short_min
        && current.close < current.ema_trend
    {
        return Some(Signal {
            action: Side::Short,
            entry_price: current.close,
            stop_loss: current.close + risk,
            take_profit: current.close - risk * cfg.reward_multiple,
            timestamp,
            rationale: format!(
                "Downtrend (ADX {:.1}), StochRSI cross down at {:.1}, RSI {:.1}, price below EMA{}",
                trend.adx, current.stoch_k, current.rsi, cfg.ema_trend_period
            ),
        });
    }

    None
}

/// Precomputed indicator series for whichever rule set is configured.
/// One code path serves the backtester and the live engine.
pub enum RuleSet {
    DayTrading {
        trend: TrendSeries,
        momentum: MomentumSeries,
    },
    Swing {
        trend: TrendSeries,
        momentum: SwingSeries,
    },
}

impl RuleSet {
    pub fn compute(context: &[Candle], exec: &[Candle], cfg: &StrategyConfig) -> Self {
        match cfg.kind {
            StrategyKind::DayTrading => RuleSet::DayTrading {
                trend: TrendSeries::compute(
                    context,
                    cfg.ema_fast_period,
                    cfg.ema_slow_period,
                    cfg.adx_period,
                ),
                momentum: MomentumSeries::compute(exec, cfg),
            },
            StrategyKind::Swing => RuleSet::Swing {
                trend: TrendSeries::compute(
                    context,
                    cfg.swing.ema_fast_period,
                    cfg.swing.ema_slow_period,
                    cfg.swing.adx_period,
                ),
                momentum: SwingSeries::compute(exec, &cfg.swing),
            },
        }
    }

    /// Apply the configured entry rules at execution bar `exec_idx` with
    /// the context reading at `ctx_idx`.
    pub fn evaluate(
        &self,
        ctx_idx: usize,
        exec_idx: usize,
        timestamp: DateTime<Utc>,
        cfg: &StrategyConfig,
    ) -> Option<Signal> {
        let prev_idx = exec_idx.checked_sub(1)?;
        match self {
            RuleSet::DayTrading { trend, momentum } => {
                let trend = trend.snapshot(ctx_idx)?;
                let current = momentum.snapshot(exec_idx)?;
                let previous = momentum.snapshot(prev_idx)?;
                evaluate_entry(&trend, &current, &previous, timestamp, cfg)
            }
            RuleSet::Swing { trend, momentum } => {
                let trend = trend.snapshot(ctx_idx)?;
                let current = momentum.snapshot(exec_idx)?;
                let previous = momentum.snapshot(prev_idx)?;
                evaluate_swing_entry(&trend, &current, &previous, timestamp, &cfg.swing)
            }
        }
    }
}

/// Live signal evaluator. Recomputes indicators over the rolling buffers
/// and applies the entry rules to the most recent closed bars.
pub struct SignalEngine {
    cfg: StrategyConfig,
}

impl SignalEngine {
    pub fn new(cfg: StrategyConfig) -> Self {
        Self { cfg }
    }

    /// Evaluate the buffers after an execution-timeframe bar close.
    /// `exec_closed` says whether the newest buffered execution bar has
    /// fully closed; a still-forming bar is never evaluated. The context
    /// reading comes from the latest context bar already closed when the
    /// evaluated bar closed, so a forming context bar cannot leak in.
    pub fn analyze(
        &self,
        context: &CandleSeries,
        exec: &CandleSeries,
        exec_closed: bool,
    ) -> Option<Signal> {
        let exec_bars = exec.candles();
        let ctx_bars = context.candles();
        let back = if exec_closed { 1 } else { 2 };
        let cur = match exec_bars.len().checked_sub(back) {
            Some(cur) if cur >= self.cfg.warmup_bars && ctx_bars.len() > self.cfg.warmup_bars => {
                cur
            }
            _ => {
                debug!(
                    exec_bars = exec_bars.len(),
                    context_bars = ctx_bars.len(),
                    "insufficient history, skipping evaluation"
                );
                return None;
            }
        };

        let ctx_tf = context.timeframe();
        let exec_close = exec_bars[cur].close_time(exec.timeframe());
        let ctx_idx = ctx_bars
            .partition_point(|c| c.close_time(ctx_tf) <= exec_close)
            .checked_sub(1)?;

        let rules = RuleSet::compute(ctx_bars, exec_bars, &self.cfg);
        rules.evaluate(ctx_idx, cur, exec_bars[cur].timestamp, &self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::Timeframe;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn cfg() -> StrategyConfig {
        StrategyConfig::default()
    }

    #[test]
    fn test_long_entry_fires() {
        let trend = TrendSnapshot {
            ema_fast: 110.0,
            ema_slow: 100.0,
            adx: 25.0,
        };
        let previous = MomentumSnapshot {
            close: 99.0,
            ema_trend: 95.0,
            rsi: 50.0,
            atr: 2.0,
            stoch_k: 10.0,
            stoch_d: 12.0,
        };
        let current = MomentumSnapshot {
            close: 100.0,
            ema_trend: 95.0,
            rsi: 55.0,
            atr: 2.0,
            stoch_k: 15.0,
            stoch_d: 12.0,
        };
        let signal = evaluate_entry(&trend, &current, &previous, ts(), &cfg()).unwrap();
        assert_eq!(signal.action, Side::Long);
        assert_eq!(signal.entry_price, 100.0);
        assert_eq!(signal.stop_loss, 96.0);
        assert_eq!(signal.take_profit, 108.0);
        assert!(signal.rationale.contains("Uptrend"));
    }

    #[test]
    fn test_short_entry_fires() {
        let trend = TrendSnapshot {
            ema_fast: 90.0,
            ema_slow: 100.0,
            adx: 25.0,
        };
        let previous = MomentumSnapshot {
            close: 101.0,
            ema_trend: 105.0,
            rsi: 50.0,
            atr: 2.0,
            stoch_k: 90.0,
            stoch_d: 88.0,
        };
        let current = MomentumSnapshot {
            close: 100.0,
            ema_trend: 105.0,
            rsi: 50.0,
            atr: 2.0,
            stoch_k: 85.0,
            stoch_d: 88.0,
        };
        let signal = evaluate_entry(&trend, &current, &previous, ts(), &cfg()).unwrap();
        assert_eq!(signal.action, Side::Short);
        assert_eq!(signal.stop_loss, 104.0);
        assert_eq!(signal.take_profit, 92.0);
    }

    #[test]
    fn test_weak_adx_blocks_entry() {
        let trend = TrendSnapshot {
            ema_fast: 110.0,
            ema_slow: 100.0,
            adx: 10.0,
        };
        let previous = MomentumSnapshot {
            close: 99.0,
            ema_trend: 95.0,
            rsi: 50.0,
            atr: 2.0,
            stoch_k: 10.0,
            stoch_d: 12.0,
        };
        let current = MomentumSnapshot {
            close: 100.0,
            ema_trend: 95.0,
            rsi: 55.0,
            atr: 2.0,
            stoch_k: 15.0,
            stoch_d: 12.0,
        };
        assert!(evaluate_entry(&trend, &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_cross_outside_zone_blocks_entry() {
        let trend = TrendSnapshot {
            ema_fast: 110.0,
            ema_slow: 100.0,
            adx: 25.0,
        };
        let previous = MomentumSnapshot {
            close: 99.0,
            ema_trend: 95.0,
            rsi: 50.0,
            atr: 2.0,
            stoch_k: 40.0,
            stoch_d: 42.0,
        };
        let current = MomentumSnapshot {
            close: 100.0,
            ema_trend: 95.0,
            rsi: 55.0,
            atr: 2.0,
            stoch_k: 45.0,
            stoch_d: 42.0,
        };
        assert!(evaluate_entry(&trend, &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_price_below_trend_ema_blocks_long() {
        let trend = TrendSnapshot {
            ema_fast: 110.0,
            ema_slow: 100.0,
            adx: 25.0,
        };
        let previous = MomentumSnapshot {
            close: 99.0,
            ema_trend: 102.0,
            rsi: 50.0,
            atr: 2.0,
            stoch_k: 10.0,
            stoch_d: 12.0,
        };
        let current = MomentumSnapshot {
            close: 100.0,
            ema_trend: 102.0,
            rsi: 55.0,
            atr: 2.0,
            stoch_k: 15.0,
            stoch_d: 12.0,
        };
        assert!(evaluate_entry(&trend, &current, &previous, ts(), &cfg()).is_none());
    }

    #[test]
    fn test_snapshot_nan_is_none() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle {
                timestamp: ts() + chrono::Duration::minutes(15 * i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        let series = MomentumSeries::compute(&candles, &cfg());
        // Far too few bars for a 200-period EMA.
        assert!(series.snapshot(9).is_none());
        assert!(series.snapshot(100).is_none());
    }

    #[test]
    fn test_analyze_requires_warmup() {
        let engine = SignalEngine::new(cfg());
        let mut exec = CandleSeries::new(Timeframe::M15);
        let mut context = CandleSeries::new(Timeframe::H1);
        for i in 0..50 {
            let c = Candle {
                timestamp: ts() + chrono::Duration::minutes(15 * i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            };
            exec.upsert(c);
            context.upsert(Candle {
                timestamp: ts() + chrono::Duration::hours(i),
                ..c
            });
        }
        assert!(engine.analyze(&context, &exec, true).is_none());
    }

    fn fast_cfg() -> StrategyConfig {
        StrategyConfig {
            warmup_bars: 0,
            ema_fast_period: 3,
            ema_slow_period: 5,
            ema_trend_period: 3,
            rsi_period: 3,
            adx_period: 3,
            adx_threshold: 0.0,
            stoch_rsi_period: 3,
            stoch_period: 3,
            stoch_k: 2,
            stoch_d: 2,
            stoch_oversold: 101.0,
            stoch_overbought: -1.0,
            rsi_long_max: 101.0,
            rsi_short_min: -1.0,
            atr_period: 3,
            atr_multiplier: 1.0,
            reward_multiple: 2.0,
            ..StrategyConfig::default()
        }
    }

    fn aggregate_hour(chunk: &[Candle]) -> Candle {
        Candle {
            timestamp: chunk[0].timestamp,
            open: chunk[0].open,
            high: chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max),
            low: chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min),
            close: chunk[chunk.len() - 1].close,
            volume: chunk.iter().map(|c| c.volume).sum(),
        }
    }

    #[test]
    fn test_analyze_prices_the_bar_that_just_closed() {
        let cfg = fast_cfg();
        let engine = SignalEngine::new(cfg.clone());

        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + i as f64 * 0.3 + (i as f64 * 0.7).sin() * 2.0)
            .collect();

        let mut exec = CandleSeries::new(Timeframe::M15);
        let mut context = CandleSeries::new(Timeframe::H1);
        let mut live = Vec::new();
        let mut chunk: Vec<Candle> = Vec::new();

        // Replay bar by bar the way the live consumer sees them: each
        // closed 15m bar lands in the buffer before evaluation, and the
        // hour candle closes together with its fourth 15m bar.
        for (i, &close) in closes.iter().enumerate() {
            let c = Candle {
                timestamp: ts() + chrono::Duration::minutes(15 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1.0,
            };
            chunk.push(c);
            exec.upsert(c);
            if chunk.len() == 4 {
                context.upsert(aggregate_hour(&chunk));
                chunk.clear();
            }
            if let Some(signal) = engine.analyze(&context, &exec, true) {
                // The signal prices the bar that just closed, never an
                // older one.
                assert_eq!(signal.timestamp, c.timestamp);
                assert_eq!(signal.entry_price, c.close);
                live.push(signal.timestamp);
            }
        }

        // Evaluating the full history in one pass must agree bar for bar
        // with what fired incrementally.
        let rules = RuleSet::compute(context.candles(), exec.candles(), &cfg);
        let mut batch = Vec::new();
        for i in 1..exec.len() {
            let exec_close = exec.candles()[i].close_time(Timeframe::M15);
            let closed = context
                .candles()
                .partition_point(|c| c.close_time(Timeframe::H1) <= exec_close);
            let Some(ctx_idx) = closed.checked_sub(1) else {
                continue;
            };
            if let Some(signal) =
                rules.evaluate(ctx_idx, i, exec.candles()[i].timestamp, &cfg)
            {
                batch.push(signal.timestamp);
            }
        }
        assert!(!batch.is_empty());
        assert_eq!(live, batch);
    }
}
