//! Paper Trading Bot
//!
//! Event-driven paper trading against live exchange data: WebSocket
//! producers feed one consumer loop that updates candle buffers, checks
//! protective exits on every trade print, and evaluates entries on each
//! closed execution bar.

mod feed;
mod history;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bot_core::{CandleSeries, Config};
use chrono::Utc;
use feed::{BinanceFeed, FeedEvent};
use paper_engine::{build_notifier, Gauges, Ledger, PaperEngine};
use strategy::SignalEngine;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "paper_bot=info,paper_engine=info,tungstenite=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting paper trading bot");

    let config = Config::from_env()?;
    let notifier = build_notifier(config.smtp.as_ref());

    let ledger = Ledger::load(&config.persistence);
    let gauges = Arc::new(Gauges::default());
    let engine = Arc::new(Mutex::new(PaperEngine::new(
        config.trading.clone(),
        ledger,
        gauges.clone(),
    )));
    let signal_engine = SignalEngine::new(config.strategy.clone());

    // Warm the indicator buffers before going live.
    let client = reqwest::Client::new();
    let exec_tf = config.feed.exec_timeframe;
    let context_tf = config.feed.context_timeframe;
    let mut exec_series = CandleSeries::from_candles(
        exec_tf,
        history::fetch_klines(
            &client,
            &config.feed.rest_url,
            &config.trading.symbol,
            exec_tf,
            config.feed.bootstrap_candles,
        )
        .await?,
    );
    let mut context_series = CandleSeries::from_candles(
        context_tf,
        history::fetch_klines(
            &client,
            &config.feed.rest_url,
            &config.trading.symbol,
            context_tf,
            config.feed.bootstrap_candles,
        )
        .await?,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let binance = BinanceFeed::new(config.feed.ws_url.clone(), config.trading.symbol.clone());
    {
        let feed = binance.clone();
        let tx = tx.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { feed.run_trades(tx, shutdown).await });
    }
    for timeframe in [exec_tf, context_tf] {
        let feed = binance.clone();
        let tx = tx.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { feed.run_klines(timeframe, tx, shutdown).await });
    }
    drop(tx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // Periodic performance report.
    {
        let engine = engine.clone();
        let notifier = notifier.clone();
        let mut shutdown = shutdown_rx.clone();
        let every = Duration::from_secs(config.feed.report_interval_hours * 3600);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(every) => {
                        let report = engine.lock().await.report();
                        info!("\n{report}");
                        notifier.notify("Performance report", &report).await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        });
    }

    notifier
        .notify(
            "Paper bot started",
            &format!(
                "Trading {} on {exec_tf} with {context_tf} context",
                config.trading.symbol
            ),
        )
        .await;

    let mut shutdown = shutdown_rx.clone();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    FeedEvent::Ticker { price, timestamp } => {
                        let result = engine.lock().await.on_ticker(price, timestamp);
                        match result {
                            Ok(Some(position)) => {
                                let reason = position
                                    .exit_reason
                                    .map(|r| r.as_str())
                                    .unwrap_or("unknown");
                                notifier
                                    .notify(
                                        &format!("Position closed ({reason})"),
                                        &format!(
                                            "{} {} closed at {:.2}, PnL {:.2}",
                                            position.side.as_str(),
                                            position.symbol,
                                            position.exit_price.unwrap_or(price),
                                            position.realized_pnl
                                        ),
                                    )
                                    .await;
                            }
                            Ok(None) => {}
                            Err(e) => error!(error = %e, "failed to process ticker"),
                        }
                    }
                    FeedEvent::Candle { timeframe, candle, closed } => {
                        if timeframe == exec_tf {
                            exec_series.upsert(candle);
                        }
                        if timeframe == context_tf {
                            context_series.upsert(candle);
                        }
                        if !(closed && timeframe == exec_tf) {
                            continue;
                        }

                        // Entry check runs under one lock so the position
                        // cannot appear between the guard and the entry.
                        // The newest buffered bar is the closed bar that
                        // triggered this evaluation, so analyze prices it.
                        let opened = {
                            let mut eng = engine.lock().await;
                            if eng.position().is_some() {
                                None
                            } else if let Some(signal) =
                                signal_engine.analyze(&context_series, &exec_series, true)
                            {
                                match eng.try_enter(&signal, Utc::now()) {
                                    Ok(pos) => pos.map(|p| (p, signal.rationale)),
                                    Err(e) => {
                                        error!(error = %e, "failed to open position");
                                        None
                                    }
                                }
                            } else {
                                None
                            }
                        };
                        if let Some((position, rationale)) = opened {
                            notifier
                                .notify(
                                    &format!("Position opened ({})", position.side.as_str()),
                                    &format!(
                                        "{} at {:.2}, stop {:.2}, target {:.2}\n{rationale}",
                                        position.symbol,
                                        position.entry_price,
                                        position.stop_loss,
                                        position.take_profit
                                    ),
                                )
                                .await;
                        }
                    }
                }
            }
        }
    }

    let report = engine.lock().await.report();
    info!("\n{report}");
    notifier.notify("Paper bot stopped", &report).await;
    info!("Paper bot stopped");
    Ok(())
}
