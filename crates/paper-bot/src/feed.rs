//! WebSocket market-data producers.
//!
//! Each stream runs in its own task, pushes parsed events into the
//! shared channel, and reconnects forever with exponential backoff
//! (1s doubling to 60s, reset after the first good message).

use bot_core::{Candle, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// One parsed market-data event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A trade print: the latest observed price.
    Ticker {
        price: f64,
        timestamp: DateTime<Utc>,
    },
    /// A candle update. `closed` is false while the bar is still forming.
    Candle {
        timeframe: Timeframe,
        candle: Candle,
        closed: bool,
    },
}

/// Exchange trade message (`<symbol>@trade`).
#[derive(Debug, Deserialize)]
struct TradeMsg {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Exchange kline message (`<symbol>@kline_<interval>`).
#[derive(Debug, Deserialize)]
struct KlineMsg {
    #[serde(rename = "k")]
    kline: KlinePayload,
}

#[derive(Debug, Deserialize)]
struct KlinePayload {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    closed: bool,
}

pub fn parse_trade(text: &str) -> Option<FeedEvent> {
    let msg: TradeMsg = serde_json::from_str(text).ok()?;
    let price = msg.price.parse().ok()?;
    let timestamp = Utc.timestamp_millis_opt(msg.trade_time).single()?;
    Some(FeedEvent::Ticker { price, timestamp })
}

pub fn parse_kline(text: &str, timeframe: Timeframe) -> Option<FeedEvent> {
    let msg: KlineMsg = serde_json::from_str(text).ok()?;
    let k = msg.kline;
    let candle = Candle {
        timestamp: Utc.timestamp_millis_opt(k.open_time).single()?,
        open: k.open.parse().ok()?,
        high: k.high.parse().ok()?,
        low: k.low.parse().ok()?,
        close: k.close.parse().ok()?,
        volume: k.volume.parse().ok()?,
    };
    Some(FeedEvent::Candle {
        timeframe,
        candle,
        closed: k.closed,
    })
}

/// A reconnecting producer for one exchange stream.
#[derive(Clone)]
pub struct BinanceFeed {
    ws_url: String,
    symbol: String,
}

impl BinanceFeed {
    pub fn new(ws_url: String, symbol: String) -> Self {
        Self { ws_url, symbol }
    }

    /// Stream trade prints until shutdown.
    pub async fn run_trades(
        &self,
        tx: mpsc::UnboundedSender<FeedEvent>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.run_stream("trade".to_string(), tx, shutdown, parse_trade)
            .await;
    }

    /// Stream kline updates for one timeframe until shutdown.
    pub async fn run_klines(
        &self,
        timeframe: Timeframe,
        tx: mpsc::UnboundedSender<FeedEvent>,
        shutdown: watch::Receiver<bool>,
    ) {
        let suffix = format!("kline_{}", timeframe.as_str());
        self.run_stream(suffix, tx, shutdown, move |text| parse_kline(text, timeframe))
            .await;
    }

    async fn run_stream<F>(
        &self,
        suffix: String,
        tx: mpsc::UnboundedSender<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
        parse: F,
    ) where
        F: Fn(&str) -> Option<FeedEvent>,
    {
        let url = format!(
            "{}/{}@{}",
            self.ws_url,
            self.symbol.to_lowercase(),
            suffix
        );
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if *shutdown.borrow() {
                return;
            }
            match connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    info!(%url, "feed connected");
                    let (mut write, mut read) = stream.split();
                    loop {
                        tokio::select! {
                            _ = shutdown.changed() => {
                                if *shutdown.borrow() {
                                    let _ = write.send(Message::Close(None)).await;
                                    return;
                                }
                            }
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    backoff = INITIAL_BACKOFF;
                                    match parse(&text) {
                                        Some(event) => {
                                            if tx.send(event).is_err() {
                                                // Consumer is gone.
                                                return;
                                            }
                                        }
                                        None => debug!(%url, "unparseable feed message"),
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    let _ = write.send(Message::Pong(data)).await;
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    warn!(%url, "feed disconnected");
                                    break;
                                }
                                Some(Err(e)) => {
                                    warn!(%url, error = %e, "feed read error");
                                    break;
                                }
                                Some(Ok(_)) => {}
                            }
                        }
                    }
                }
                Err(e) => warn!(%url, error = %e, "feed connect failed"),
            }

            warn!(%url, seconds = backoff.as_secs(), "reconnecting after backoff");
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}
