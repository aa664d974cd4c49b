//! The paper-trading engine: a single simulated account with at most one
//! open position.
//!
//! Exits are checked before entries everywhere, and the stop loss is
//! always checked before the take profit, so a bar that touches both
//! levels resolves conservatively as a loss.

use std::sync::Arc;

use bot_core::config::TradingConfig;
use bot_core::{Candle, ExitReason, Position, Result, Side, Signal};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::ledger::Ledger;
use crate::metrics::Gauges;
use crate::stats::TradeStats;

/// Simulated account state.
#[derive(Debug)]
pub struct Account {
    pub balance: f64,
    pub position: Option<Position>,
}

pub struct PaperEngine {
    trading: TradingConfig,
    account: Account,
    ledger: Ledger,
    gauges: Arc<Gauges>,
}

impl PaperEngine {
    /// Build an engine on top of a ledger, resuming any persisted state:
    /// the last recorded balance and a still-open position survive
    /// restarts.
    pub fn new(trading: TradingConfig, ledger: Ledger, gauges: Arc<Gauges>) -> Self {
        let balance = ledger.last_balance().unwrap_or(trading.starting_balance);
        let position = ledger.open_position();
        if let Some(pos) = &position {
            info!(id = %pos.id, side = pos.side.as_str(), entry = pos.entry_price,
                "resuming open position from ledger");
        }
        gauges.set_balance(balance);
        gauges.set_open_positions(position.is_some() as u64);
        gauges.set_position_size(position.as_ref().map(|p| p.size).unwrap_or(0.0));

        Self {
            trading,
            account: Account { balance, position },
            ledger,
            gauges,
        }
    }

    pub fn balance(&self) -> f64 {
        self.account.balance
    }

    pub fn position(&self) -> Option<&Position> {
        self.account.position.as_ref()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Live tick handler: exits the open position at the observed price
    /// when a protective level is breached. Stop loss wins over take
    /// profit. Returns the closed position, if any.
    pub fn on_ticker(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        self.gauges.set_last_price(price);

        let Some(position) = self.account.position.take() else {
            return Ok(None);
        };
        self.gauges.set_unrealized_pnl(position.unrealized_pnl(price));

        let reason = match position.side {
            Side::Long if price <= position.stop_loss => Some(ExitReason::StopLoss),
            Side::Long if price >= position.take_profit => Some(ExitReason::TakeProfit),
            Side::Short if price >= position.stop_loss => Some(ExitReason::StopLoss),
            Side::Short if price <= position.take_profit => Some(ExitReason::TakeProfit),
            _ => None,
        };
        match reason {
            Some(reason) => self.finish_exit(position, price, timestamp, reason).map(Some),
            None => {
                self.account.position = Some(position);
                Ok(None)
            }
        }
    }

    /// Bar-based exit check for backtests: the exit fills at the breached
    /// level itself, not at the bar close. Stop loss wins when both
    /// levels fall inside one bar's range.
    pub fn check_exit_bar(&mut self, bar: &Candle) -> Result<Option<Position>> {
        let Some(position) = self.account.position.take() else {
            return Ok(None);
        };

        let exit = match position.side {
            Side::Long if bar.low <= position.stop_loss => {
                Some((position.stop_loss, ExitReason::StopLoss))
            }
            Side::Long if bar.high >= position.take_profit => {
                Some((position.take_profit, ExitReason::TakeProfit))
            }
            Side::Short if bar.high >= position.stop_loss => {
                Some((position.stop_loss, ExitReason::StopLoss))
            }
            Side::Short if bar.low <= position.take_profit => {
                Some((position.take_profit, ExitReason::TakeProfit))
            }
            _ => None,
        };
        match exit {
            Some((price, reason)) => self
                .finish_exit(position, price, bar.timestamp, reason)
                .map(Some),
            None => {
                self.account.position = Some(position);
                Ok(None)
            }
        }
    }

    /// Attempt to open a position from a signal. Rejected (returning
    /// `None`) when a position is already open, the stop sits on the
    /// entry, or sizing rounds down to nothing.
    pub fn try_enter(
        &mut self,
        signal: &Signal,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        if self.account.position.is_some() {
            debug!("signal ignored, position already open");
            return Ok(None);
        }

        let risk_distance = signal.risk_distance();
        if risk_distance <= 0.0 {
            warn!(entry = signal.entry_price, "signal rejected, stop equals entry");
            return Ok(None);
        }

        let risk_amount = self.account.balance * self.trading.risk_fraction;
        let mut size = risk_amount / risk_distance;

        // Cap notional exposure to a fraction of the balance.
        let max_notional = self.account.balance * self.trading.max_entry_fraction;
        if size * signal.entry_price > max_notional {
            size = max_notional / signal.entry_price;
        }
        if size <= 0.0 {
            warn!(balance = self.account.balance, "signal rejected, size is zero");
            return Ok(None);
        }

        let position = Position::open(&self.trading.symbol, signal, size, timestamp);
        self.ledger.record(&position)?;
        info!(
            id = %position.id,
            side = position.side.as_str(),
            entry = position.entry_price,
            stop = position.stop_loss,
            target = position.take_profit,
            size,
            rationale = %signal.rationale,
            "position opened"
        );
        self.gauges.set_open_positions(1);
        self.gauges.set_position_size(size);
        self.account.position = Some(position.clone());
        Ok(Some(position))
    }

    /// Close the open position at an arbitrary price.
    pub fn close_manual(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        let Some(position) = self.account.position.take() else {
            return Ok(None);
        };
        self.finish_exit(position, price, timestamp, ExitReason::Manual)
            .map(Some)
    }

    /// Current statistics over the ledger.
    pub fn stats(&self) -> TradeStats {
        let equity: Vec<f64> = std::iter::once(self.trading.starting_balance)
            .chain(self.ledger.balance_history().iter().map(|p| p.balance))
            .collect();
        TradeStats::compute(self.ledger.trades(), &equity)
    }

    pub fn report(&self) -> String {
        self.stats().render_report(self.account.balance)
    }

    fn finish_exit(
        &mut self,
        mut position: Position,
        exit_price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Position> {
        position.close(exit_price, timestamp, reason, self.trading.fee_rate);
        self.account.balance += position.realized_pnl;

        self.ledger.record(&position)?;
        self.ledger.append_balance(timestamp, self.account.balance)?;

        self.gauges.set_balance(self.account.balance);
        self.gauges.set_open_positions(0);
        self.gauges.set_position_size(0.0);
        self.gauges.set_unrealized_pnl(0.0);
        self.gauges.set_last_trade_pnl(position.realized_pnl);
        self.gauges.incr_trades_closed();

        info!(
            id = %position.id,
            reason = reason.as_str(),
            exit = exit_price,
            pnl = position.realized_pnl,
            balance = self.account.balance,
            "position closed"
        );
        Ok(position)
    }
}
