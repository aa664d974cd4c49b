use anyhow::{bail, Context};
use backtester::{load_candles_csv, resample, run_backtest};
use bot_core::Config;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: backtester <candles.csv>")?;

    let cfg = Config::from_env()?;
    let exec = load_candles_csv(&path)?;
    if exec.is_empty() {
        bail!("no candles in {path}");
    }
    let context = resample(&exec, cfg.feed.context_timeframe);

    let result = run_backtest(&cfg, exec, context)?;

    println!("{}", result.stats.render_report(result.final_balance));
    println!();
    println!("Bars processed: {}", result.bars_processed);
    println!("Trades:         {}", result.trades.len());
    println!(
        "Return:         {:.2}%",
        (result.final_balance / result.initial_balance - 1.0) * 100.0
    );
    Ok(())
}
