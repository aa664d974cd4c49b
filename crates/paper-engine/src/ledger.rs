//! Trade and balance persistence.
//!
//! The trade log is a single JSON array rewritten on every update so the
//! file is always a complete, valid snapshot. Balance history is an
//! append-only CSV. Both files are optional: `in_memory` ledgers back
//! the backtester, where determinism matters and files do not.

use std::fs;
use std::path::PathBuf;

use bot_core::config::PersistenceConfig;
use bot_core::{Position, PositionStatus, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One equity observation, recorded whenever a position closes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
}

#[derive(Debug)]
pub struct Ledger {
    trade_log_path: Option<PathBuf>,
    balance_history_path: Option<PathBuf>,
    trades: Vec<Position>,
    balances: Vec<BalancePoint>,
}

impl Ledger {
    /// A ledger that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            trade_log_path: None,
            balance_history_path: None,
            trades: Vec::new(),
            balances: Vec::new(),
        }
    }

    /// Load persisted state. Missing files mean a fresh start; corrupt
    /// files are logged and treated as empty rather than aborting.
    pub fn load(persistence: &PersistenceConfig) -> Self {
        let trade_log_path = PathBuf::from(&persistence.trade_log_path);
        let balance_history_path = PathBuf::from(&persistence.balance_history_path);

        let trades = match fs::read_to_string(&trade_log_path) {
            Ok(raw) => match serde_json::from_str::<Vec<Position>>(&raw) {
                Ok(trades) => trades,
                Err(e) => {
                    warn!(path = %trade_log_path.display(), error = %e,
                        "trade log is corrupt, starting with an empty ledger");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let balances = match csv::Reader::from_path(&balance_history_path) {
            Ok(mut reader) => {
                let mut points = Vec::new();
                let mut corrupt = false;
                for row in reader.deserialize::<BalancePoint>() {
                    match row {
                        Ok(point) => points.push(point),
                        Err(e) => {
                            warn!(path = %balance_history_path.display(), error = %e,
                                "balance history is corrupt, starting fresh");
                            corrupt = true;
                            break;
                        }
                    }
                }
                if corrupt {
                    Vec::new()
                } else {
                    points
                }
            }
            Err(_) => Vec::new(),
        };

        Self {
            trade_log_path: Some(trade_log_path),
            balance_history_path: Some(balance_history_path),
            trades,
            balances,
        }
    }

    /// Insert or update a trade by id and persist the full log.
    pub fn record(&mut self, position: &Position) -> Result<()> {
        match self.trades.iter_mut().find(|t| t.id == position.id) {
            Some(existing) => *existing = position.clone(),
            None => self.trades.push(position.clone()),
        }
        if let Some(path) = &self.trade_log_path {
            let json = serde_json::to_string_pretty(&self.trades)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// Append one equity observation.
    pub fn append_balance(&mut self, timestamp: DateTime<Utc>, balance: f64) -> Result<()> {
        let point = BalancePoint { timestamp, balance };
        self.balances.push(point);
        if let Some(path) = &self.balance_history_path {
            let new_file = !path.exists();
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(new_file)
                .from_writer(file);
            writer.serialize(point)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// The open position recorded in the log, if any.
    pub fn open_position(&self) -> Option<Position> {
        self.trades
            .iter()
            .rev()
            .find(|t| t.status == PositionStatus::Open)
            .cloned()
    }

    pub fn last_balance(&self) -> Option<f64> {
        self.balances.last().map(|p| p.balance)
    }

    pub fn trades(&self) -> &[Position] {
        &self.trades
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Position> {
        self.trades
            .iter()
            .filter(|t| t.status == PositionStatus::Closed)
    }

    pub fn balance_history(&self) -> &[BalancePoint] {
        &self.balances
    }
}
