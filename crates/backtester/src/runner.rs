//! The backtest loop.
//!
//! Replays execution-timeframe bars in order through the paper engine.
//! Exits are checked before entries on every bar, and a bar that closes
//! a position never opens the next one. Entry rules see only bars that
//! have fully closed, and the context timeframe is aligned by close
//! time so no higher-timeframe bar is consumed before it finishes.

use std::sync::Arc;

use bot_core::config::Config;
use bot_core::{Candle, CandleSeries, Position, Result, Signal, Timeframe};
use paper_engine::{Gauges, Ledger, PaperEngine, TradeStats};
use serde::Serialize;
use strategy::RuleSet;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub trades: Vec<Position>,
    pub equity_curve: Vec<f64>,
    pub stats: TradeStats,
    pub bars_processed: usize,
}

/// Index of the most recent context bar fully closed at `fine_close`,
/// or `None` when no context bar has closed yet.
fn context_index(
    context: &[Candle],
    context_tf: Timeframe,
    fine_close: chrono::DateTime<chrono::Utc>,
) -> Option<usize> {
    let closed = context.partition_point(|c| c.close_time(context_tf) <= fine_close);
    closed.checked_sub(1)
}

/// One simulation step. Exits are checked first, and a bar that had a
/// position open never opens a new one, even when the entry rules fire
/// on it.
fn step(
    engine: &mut PaperEngine,
    bar: &Candle,
    entry: impl FnOnce() -> Option<Signal>,
) -> Result<()> {
    if engine.position().is_some() {
        engine.check_exit_bar(bar)?;
        return Ok(());
    }
    if let Some(signal) = entry() {
        engine.try_enter(&signal, bar.timestamp)?;
    }
    Ok(())
}

/// Run the strategy over historical data. `exec` drives the simulation;
/// `context` supplies the higher-timeframe trend filter. Both inputs
/// are sorted and deduplicated before use, so two runs over the same
/// data produce identical results.
pub fn run_backtest(cfg: &Config, exec: Vec<Candle>, context: Vec<Candle>) -> Result<BacktestResult> {
    let exec_tf = cfg.feed.exec_timeframe;
    let context_tf = cfg.feed.context_timeframe;
    let exec = CandleSeries::from_candles(exec_tf, exec);
    let context = CandleSeries::from_candles(context_tf, context);
    let exec = exec.candles();
    let context = context.candles();

    info!(
        exec_bars = exec.len(),
        context_bars = context.len(),
        exec_tf = %exec_tf,
        context_tf = %context_tf,
        "starting backtest"
    );

    let rules = RuleSet::compute(context, exec, &cfg.strategy);

    let mut engine = PaperEngine::new(
        cfg.trading.clone(),
        Ledger::in_memory(),
        Arc::new(Gauges::default()),
    );

    let start = cfg.strategy.warmup_bars.min(exec.len());
    let mut bars_processed = 0;
    for i in start..exec.len() {
        let bar = &exec[i];
        bars_processed += 1;

        step(&mut engine, bar, || {
            let ctx_idx = context_index(context, context_tf, bar.close_time(exec_tf))?;
            rules.evaluate(ctx_idx, i, bar.timestamp, &cfg.strategy)
        })?;
    }

    let initial_balance = cfg.trading.starting_balance;
    let equity_curve: Vec<f64> = std::iter::once(initial_balance)
        .chain(engine.ledger().balance_history().iter().map(|p| p.balance))
        .collect();
    let trades = engine.ledger().trades().to_vec();
    let stats = TradeStats::compute(&trades, &equity_curve);
    let final_balance = engine.balance();

    info!(
        trades = trades.len(),
        final_balance,
        bars_processed,
        "backtest finished"
    );

    Ok(BacktestResult {
        initial_balance,
        final_balance,
        trades,
        equity_curve,
        stats,
        bars_processed,
    })
}
