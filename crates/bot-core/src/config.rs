//! Configuration surface for the paper-trading system.
//!
//! Every option is an environment variable with a default, so a bare
//! `Config::from_env()` yields a working paper-trading setup.

use crate::types::Timeframe;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    pub strategy: StrategyConfig,
    pub persistence: PersistenceConfig,
    pub feed: FeedConfig,
    /// SMTP notification settings; `None` degrades to a no-op notifier.
    pub smtp: Option<SmtpConfig>,
}

/// Account and execution parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    pub symbol: String,
    pub starting_balance: f64,
    /// Fraction of the balance risked per trade (0.01 = 1%).
    pub risk_fraction: f64,
    /// Taker fee applied to entry and exit notional.
    pub fee_rate: f64,
    /// Entry notional is capped at this fraction of the balance.
    pub max_entry_fraction: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            starting_balance: 10_000.0,
            risk_fraction: 0.01,
            fee_rate: 0.0004,
            max_entry_fraction: 0.98,
        }
    }
}

/// Which entry rule set the bot runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Stochastic RSI cross on the execution timeframe, EMA/ADX trend gate.
    DayTrading,
    /// MACD histogram cross with a volume filter on hourly bars, 4h trend gate.
    Swing,
}

impl StrategyKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day_trading" | "day-trading" => Some(Self::DayTrading),
            "swing" | "multi_timeframe" => Some(Self::Swing),
            _ => None,
        }
    }
}

/// Strategy thresholds. All rule parameters are configuration, not code.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Minimum closed bars per series before any evaluation.
    pub warmup_bars: usize,
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    /// Long moving average on the execution timeframe (price confirmation).
    pub ema_trend_period: usize,
    pub rsi_period: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub stoch_rsi_period: usize,
    pub stoch_period: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub rsi_long_max: f64,
    pub rsi_short_min: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub reward_multiple: f64,
    /// Parameters for the swing rule set, used when `kind` is `Swing`.
    pub swing: SwingConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: StrategyKind::DayTrading,
            warmup_bars: 200,
            ema_fast_period: 50,
            ema_slow_period: 200,
            ema_trend_period: 200,
            rsi_period: 14,
            adx_period: 14,
            adx_threshold: 18.0,
            stoch_rsi_period: 14,
            stoch_period: 14,
            stoch_k: 3,
            stoch_d: 3,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            rsi_long_max: 60.0,
            rsi_short_min: 40.0,
            atr_period: 14,
            atr_multiplier: 2.0,
            reward_multiple: 2.0,
            swing: SwingConfig::default(),
        }
    }
}

/// Swing rule set: 4h EMA trend with ADX confirmation, hourly MACD
/// histogram cross inside an RSI band, volume above its average.
/// Meant to run with a 1h execution / 4h context feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SwingConfig {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub rsi_long_min: f64,
    pub rsi_long_max: f64,
    pub rsi_short_min: f64,
    pub rsi_short_max: f64,
    pub volume_sma_period: usize,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub reward_multiple: f64,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            ema_fast_period: 50,
            ema_slow_period: 200,
            adx_period: 14,
            adx_threshold: 22.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            rsi_long_min: 30.0,
            rsi_long_max: 40.0,
            rsi_short_min: 60.0,
            rsi_short_max: 70.0,
            volume_sma_period: 20,
            atr_period: 14,
            atr_multiplier: 1.5,
            reward_multiple: 2.8,
        }
    }
}

/// Ledger file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub trade_log_path: String,
    pub balance_history_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            trade_log_path: "trade_log.json".to_string(),
            balance_history_path: "balance_history.csv".to_string(),
        }
    }
}

/// Market-data feed endpoints and live cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub ws_url: String,
    pub rest_url: String,
    /// Execution timeframe the entry rules run on.
    pub exec_timeframe: Timeframe,
    /// Higher context timeframe for the trend filter.
    pub context_timeframe: Timeframe,
    /// Candles fetched per timeframe to warm the buffers at startup.
    pub bootstrap_candles: usize,
    pub report_interval_hours: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://stream.binance.com:9443/ws".to_string(),
            rest_url: "https://api.binance.com".to_string(),
            exec_timeframe: Timeframe::M15,
            context_timeframe: Timeframe::H1,
            bootstrap_candles: 500,
            report_interval_hours: 24,
        }
    }
}

/// SMTP delivery settings for the notification boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub to_email: String,
}

impl SmtpConfig {
    /// Read SMTP settings; `None` when the required variables are absent.
    pub fn from_env() -> Option<Self> {
        let host = env::var("SMTP_HOST").ok()?;
        let username = env::var("SMTP_USERNAME").ok()?;
        let password = env::var("SMTP_PASSWORD").ok()?;
        let from_email = env::var("SMTP_FROM").ok()?;
        let to_email = env::var("SMTP_TO").ok()?;
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);

        Some(Self {
            host,
            port,
            username,
            password,
            from_email,
            to_email,
        })
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = TradingConfig::default();
        let trading = TradingConfig {
            symbol: env::var("SYMBOL").unwrap_or(defaults.symbol),
            starting_balance: env_f64("PAPER_TRADING_BALANCE", defaults.starting_balance)?,
            risk_fraction: env_f64("RISK_FRACTION", defaults.risk_fraction)?,
            fee_rate: env_f64("TAKER_FEE", defaults.fee_rate)?,
            max_entry_fraction: env_f64("MAX_ENTRY_FRACTION", defaults.max_entry_fraction)?,
        };

        let s = SwingConfig::default();
        let swing = SwingConfig {
            ema_fast_period: env_usize("SWING_EMA_FAST_PERIOD", s.ema_fast_period)?,
            ema_slow_period: env_usize("SWING_EMA_SLOW_PERIOD", s.ema_slow_period)?,
            adx_period: env_usize("SWING_ADX_PERIOD", s.adx_period)?,
            adx_threshold: env_f64("SWING_ADX_THRESHOLD", s.adx_threshold)?,
            macd_fast: env_usize("SWING_MACD_FAST", s.macd_fast)?,
            macd_slow: env_usize("SWING_MACD_SLOW", s.macd_slow)?,
            macd_signal: env_usize("SWING_MACD_SIGNAL", s.macd_signal)?,
            rsi_period: env_usize("SWING_RSI_PERIOD", s.rsi_period)?,
            rsi_long_min: env_f64("SWING_RSI_LONG_MIN", s.rsi_long_min)?,
            rsi_long_max: env_f64("SWING_RSI_LONG_MAX", s.rsi_long_max)?,
            rsi_short_min: env_f64("SWING_RSI_SHORT_MIN", s.rsi_short_min)?,
            rsi_short_max: env_f64("SWING_RSI_SHORT_MAX", s.rsi_short_max)?,
            volume_sma_period: env_usize("SWING_VOLUME_SMA_PERIOD", s.volume_sma_period)?,
            atr_period: env_usize("SWING_ATR_PERIOD", s.atr_period)?,
            atr_multiplier: env_f64("SWING_ATR_MULTIPLIER", s.atr_multiplier)?,
            reward_multiple: env_f64("SWING_REWARD_MULTIPLE", s.reward_multiple)?,
        };

        let d = StrategyConfig::default();
        let strategy = StrategyConfig {
            kind: env_strategy_kind("STRATEGY", d.kind)?,
            warmup_bars: env_usize("WARMUP_BARS", d.warmup_bars)?,
            ema_fast_period: env_usize("EMA_FAST_PERIOD", d.ema_fast_period)?,
            ema_slow_period: env_usize("EMA_SLOW_PERIOD", d.ema_slow_period)?,
            ema_trend_period: env_usize("EMA_TREND_PERIOD", d.ema_trend_period)?,
            rsi_period: env_usize("RSI_PERIOD", d.rsi_period)?,
            adx_period: env_usize("ADX_PERIOD", d.adx_period)?,
            adx_threshold: env_f64("ADX_THRESHOLD", d.adx_threshold)?,
            stoch_rsi_period: env_usize("STOCH_RSI_PERIOD", d.stoch_rsi_period)?,
            stoch_period: env_usize("STOCH_PERIOD", d.stoch_period)?,
            stoch_k: env_usize("STOCH_K", d.stoch_k)?,
            stoch_d: env_usize("STOCH_D", d.stoch_d)?,
            stoch_oversold: env_f64("STOCH_OVERSOLD", d.stoch_oversold)?,
            stoch_overbought: env_f64("STOCH_OVERBOUGHT", d.stoch_overbought)?,
            rsi_long_max: env_f64("RSI_LONG_MAX", d.rsi_long_max)?,
            rsi_short_min: env_f64("RSI_SHORT_MIN", d.rsi_short_min)?,
            atr_period: env_usize("ATR_PERIOD", d.atr_period)?,
            atr_multiplier: env_f64("ATR_MULTIPLIER", d.atr_multiplier)?,
            reward_multiple: env_f64("REWARD_MULTIPLE", d.reward_multiple)?,
            swing,
        };

        let p = PersistenceConfig::default();
        let persistence = PersistenceConfig {
            trade_log_path: env::var("TRADE_LOG_PATH").unwrap_or(p.trade_log_path),
            balance_history_path: env::var("BALANCE_HISTORY_PATH")
                .unwrap_or(p.balance_history_path),
        };

        let f = FeedConfig::default();
        // The swing rules are defined on hourly bars with 4h context.
        let (exec_default, context_default) = match strategy.kind {
            StrategyKind::DayTrading => (f.exec_timeframe, f.context_timeframe),
            StrategyKind::Swing => (Timeframe::H1, Timeframe::H4),
        };
        let feed = FeedConfig {
            ws_url: env::var("FEED_WS_URL").unwrap_or(f.ws_url),
            rest_url: env::var("FEED_REST_URL").unwrap_or(f.rest_url),
            exec_timeframe: env_timeframe("EXEC_TIMEFRAME", exec_default)?,
            context_timeframe: env_timeframe("CONTEXT_TIMEFRAME", context_default)?,
            bootstrap_candles: env_usize("BOOTSTRAP_CANDLES", f.bootstrap_candles)?,
            report_interval_hours: env_usize("REPORT_INTERVAL_HOURS", f.report_interval_hours as usize)?
                as u64,
        };

        Ok(Self {
            trading,
            strategy,
            persistence,
            feed,
            smtp: SmtpConfig::from_env(),
        })
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("{key} is not a valid number: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("{key} is not a valid integer: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}

fn env_strategy_kind(key: &str, default: StrategyKind) -> Result<StrategyKind> {
    match env::var(key) {
        Ok(raw) => StrategyKind::parse(&raw).ok_or_else(|| Error::Config {
            message: format!("{key} is not a known strategy: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}

fn env_timeframe(key: &str, default: Timeframe) -> Result<Timeframe> {
    match env::var(key) {
        Ok(raw) => Timeframe::parse(&raw).ok_or_else(|| Error::Config {
            message: format!("{key} is not a valid timeframe: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let trading = TradingConfig::default();
        assert_eq!(trading.starting_balance, 10_000.0);
        assert!(trading.risk_fraction > 0.0 && trading.risk_fraction < 1.0);
        assert!(trading.max_entry_fraction < 1.0);

        let strategy = StrategyConfig::default();
        assert_eq!(strategy.kind, StrategyKind::DayTrading);
        assert!(strategy.stoch_oversold < strategy.stoch_overbought);
        assert!(strategy.warmup_bars >= strategy.ema_slow_period);

        let swing = SwingConfig::default();
        assert!(swing.rsi_long_min < swing.rsi_long_max);
        assert!(swing.rsi_short_min < swing.rsi_short_max);
        assert!(swing.rsi_long_max < swing.rsi_short_min);
        assert!(swing.macd_fast < swing.macd_slow);
    }

    #[test]
    fn test_strategy_kind_parses_aliases() {
        assert_eq!(StrategyKind::parse("swing"), Some(StrategyKind::Swing));
        assert_eq!(
            StrategyKind::parse("multi_timeframe"),
            Some(StrategyKind::Swing)
        );
        assert_eq!(
            StrategyKind::parse("DAY_TRADING"),
            Some(StrategyKind::DayTrading)
        );
        assert_eq!(StrategyKind::parse("scalping"), None);
    }

    #[test]
    fn test_env_f64_rejects_garbage() {
        env::set_var("TEST_BAD_F64", "not-a-number");
        assert!(env_f64("TEST_BAD_F64", 1.0).is_err());
        env::remove_var("TEST_BAD_F64");
        assert_eq!(env_f64("TEST_BAD_F64", 1.5).unwrap(), 1.5);
    }
}
