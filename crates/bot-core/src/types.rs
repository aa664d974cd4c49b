//! Domain types: candles, timeframes, signals, and positions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One OHLCV bar for a fixed time bucket.
///
/// `timestamp` is the bucket *open* time; the bar is closed once
/// `timestamp + timeframe` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// The instant at which this bar is fully closed.
    pub fn close_time(&self, timeframe: Timeframe) -> DateTime<Utc> {
        self.timestamp + timeframe.duration()
    }
}

/// Supported candle bucket widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
        }
    }

    /// Exchange-style interval label ("15m", "1h", "4h").
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "15m" => Some(Timeframe::M15),
            "1h" => Some(Timeframe::H1),
            "4h" => Some(Timeframe::H4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-ordered, deduplicated candle buffer for one timeframe.
///
/// Live feeds upsert the forming candle by timestamp, so consumers must
/// treat the final element as potentially still open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

/// Buffer bounds for live mode: trim back to `TRIM_LEN` once the buffer
/// grows past `MAX_LEN`.
const MAX_LEN: usize = 600;
const TRIM_LEN: usize = 500;

impl CandleSeries {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            candles: Vec::new(),
        }
    }

    /// Build a series from unordered input: sorts by timestamp and keeps the
    /// last occurrence of any duplicated timestamp.
    pub fn from_candles(timeframe: Timeframe, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        candles.reverse();
        candles.dedup_by_key(|c| c.timestamp);
        candles.reverse();
        Self { timeframe, candles }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Insert a candle, replacing an existing one with the same timestamp.
    ///
    /// Out-of-order inserts keep the buffer sorted. The buffer is trimmed
    /// from the front once it exceeds the live-mode window.
    pub fn upsert(&mut self, candle: Candle) {
        match self
            .candles
            .binary_search_by_key(&candle.timestamp, |c| c.timestamp)
        {
            Ok(i) => self.candles[i] = candle,
            Err(i) => self.candles.insert(i, candle),
        }
        if self.candles.len() > MAX_LEN {
            let excess = self.candles.len() - TRIM_LEN;
            self.candles.drain(..excess);
        }
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// PnL sign: +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "MANUAL")]
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "TP",
            ExitReason::StopLoss => "SL",
            ExitReason::Manual => "MANUAL",
        }
    }
}

/// Position lifecycle state. OPEN → CLOSED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// A directional entry proposal produced by the signal engine.
///
/// Produced fresh on each evaluation and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub timestamp: DateTime<Utc>,
    pub rationale: String,
}

impl Signal {
    /// Distance between entry and stop. Position sizing divides by this,
    /// so a zero distance makes the signal unusable.
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Reward:risk multiple implied by the stop and target.
    pub fn reward_ratio(&self) -> f64 {
        let risk = self.risk_distance();
        if risk == 0.0 {
            return 0.0;
        }
        (self.take_profit - self.entry_price).abs() / risk
    }
}

/// A simulated trade. At most one position is OPEN system-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub open_time: DateTime<Utc>,
    pub status: PositionStatus,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub realized_pnl: f64,
    pub commission: f64,
}

impl Position {
    /// Open a new position from an accepted signal.
    ///
    /// The id is derived from the trade's identity rather than random, so
    /// replaying the same data produces the same ledger byte for byte.
    pub fn open(symbol: &str, signal: &Signal, size: f64, open_time: DateTime<Utc>) -> Self {
        let id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!(
                "{symbol}:{}:{}:{}",
                signal.action.as_str(),
                open_time.timestamp_millis(),
                signal.entry_price
            )
            .as_bytes(),
        );
        Self {
            id,
            symbol: symbol.to_string(),
            side: signal.action,
            entry_price: signal.entry_price,
            size,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            open_time,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            realized_pnl: 0.0,
            commission: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Notional value at entry.
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.size
    }

    /// Mark-to-market PnL at `price`, before fees.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Close the position at `exit_price`.
    ///
    /// The round-trip commission `(entry_value + exit_value) * fee_rate` is
    /// charged exactly once here; `realized_pnl` is net of it. Exit fields
    /// are set exactly once — closing an already-closed position is a no-op.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
        fee_rate: f64,
    ) {
        if !self.is_open() {
            return;
        }
        let raw_pnl = (exit_price - self.entry_price) * self.size * self.side.sign();
        let fee = (self.entry_value() + exit_price * self.size) * fee_rate;

        self.status = PositionStatus::Closed;
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.exit_reason = Some(reason);
        self.commission = fee;
        self.realized_pnl = raw_pnl - fee;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + minutes * 60, 0).unwrap()
    }

    fn candle(minutes: i64, close: f64) -> Candle {
        Candle {
            timestamp: ts(minutes),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn long_signal(entry: f64, stop: f64, target: f64) -> Signal {
        Signal {
            action: Side::Long,
            entry_price: entry,
            stop_loss: stop,
            take_profit: target,
            timestamp: ts(0),
            rationale: "test".to_string(),
        }
    }

    #[test]
    fn test_close_nets_round_trip_fee() {
        let signal = long_signal(100.0, 98.0, 104.0);
        let mut pos = Position::open("BTCUSDT", &signal, 50.0, ts(0));
        pos.close(104.0, ts(15), ExitReason::TakeProfit, 0.0004);

        let expected_fee = (100.0 * 50.0 + 104.0 * 50.0) * 0.0004;
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.exit_reason, Some(ExitReason::TakeProfit));
        assert_eq!(pos.commission, expected_fee);
        assert_eq!(pos.realized_pnl, (104.0 - 100.0) * 50.0 - expected_fee);
    }

    #[test]
    fn test_close_short_sign() {
        let signal = Signal {
            action: Side::Short,
            entry_price: 100.0,
            stop_loss: 102.0,
            take_profit: 96.0,
            timestamp: ts(0),
            rationale: "test".to_string(),
        };
        let mut pos = Position::open("BTCUSDT", &signal, 10.0, ts(0));
        pos.close(96.0, ts(15), ExitReason::TakeProfit, 0.0);
        assert_eq!(pos.realized_pnl, (100.0 - 96.0) * 10.0);
    }

    #[test]
    fn test_close_is_terminal() {
        let signal = long_signal(100.0, 98.0, 104.0);
        let mut pos = Position::open("BTCUSDT", &signal, 1.0, ts(0));
        pos.close(104.0, ts(15), ExitReason::TakeProfit, 0.0);
        let first = pos.clone();

        // Second close must not touch exit fields.
        pos.close(90.0, ts(30), ExitReason::StopLoss, 0.1);
        assert_eq!(pos, first);
    }

    #[test]
    fn test_unrealized_pnl_by_side() {
        let signal = long_signal(100.0, 98.0, 104.0);
        let long = Position::open("BTCUSDT", &signal, 2.0, ts(0));
        assert_eq!(long.unrealized_pnl(103.0), 6.0);

        let mut short_signal = signal;
        short_signal.action = Side::Short;
        let short = Position::open("BTCUSDT", &short_signal, 2.0, ts(0));
        assert_eq!(short.unrealized_pnl(103.0), -6.0);
    }

    #[test]
    fn test_series_sorts_and_dedups() {
        let series = CandleSeries::from_candles(
            Timeframe::M15,
            vec![candle(30, 3.0), candle(0, 1.0), candle(30, 4.0), candle(15, 2.0)],
        );
        let closes: Vec<f64> = series.candles().iter().map(|c| c.close).collect();
        // Sorted, and the later duplicate at t=30 wins.
        assert_eq!(closes, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_series_upsert_replaces_forming_candle() {
        let mut series = CandleSeries::new(Timeframe::M15);
        series.upsert(candle(0, 1.0));
        series.upsert(candle(15, 2.0));
        series.upsert(candle(15, 2.5)); // forming candle update
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 2.5);
    }

    #[test]
    fn test_series_upsert_trims_window() {
        let mut series = CandleSeries::new(Timeframe::M15);
        for i in 0..601 {
            series.upsert(candle(i as i64 * 15, i as f64));
        }
        assert_eq!(series.len(), 500);
        assert_eq!(series.last().unwrap().close, 600.0);
    }

    #[test]
    fn test_timeframe_close_time() {
        let c = candle(0, 1.0);
        assert_eq!(c.close_time(Timeframe::H1), ts(60));
    }

    #[test]
    fn test_exit_reason_serializes_short_form() {
        assert_eq!(
            serde_json::to_string(&ExitReason::TakeProfit).unwrap(),
            "\"TP\""
        );
        assert_eq!(
            serde_json::to_string(&ExitReason::StopLoss).unwrap(),
            "\"SL\""
        );
    }
}
