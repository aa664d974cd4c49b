//! Lightweight gauges shared between the engine and observers.
//!
//! Float gauges are stored as raw bits in an `AtomicU64` so readers never
//! need a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Gauges {
    balance: AtomicU64,
    last_price: AtomicU64,
    position_size: AtomicU64,
    unrealized_pnl: AtomicU64,
    last_trade_pnl: AtomicU64,
    open_positions: AtomicU64,
    trades_closed: AtomicU64,
}

/// Point-in-time copy of every gauge.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub balance: f64,
    pub last_price: f64,
    pub position_size: f64,
    pub unrealized_pnl: f64,
    pub last_trade_pnl: f64,
    pub open_positions: u64,
    pub trades_closed: u64,
}

impl Gauges {
    pub fn set_balance(&self, value: f64) {
        self.balance.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_last_price(&self, value: f64) {
        self.last_price.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_position_size(&self, value: f64) {
        self.position_size.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_unrealized_pnl(&self, value: f64) {
        self.unrealized_pnl.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_last_trade_pnl(&self, value: f64) {
        self.last_trade_pnl.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_open_positions(&self, count: u64) {
        self.open_positions.store(count, Ordering::Relaxed);
    }

    pub fn incr_trades_closed(&self) {
        self.trades_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            balance: f64::from_bits(self.balance.load(Ordering::Relaxed)),
            last_price: f64::from_bits(self.last_price.load(Ordering::Relaxed)),
            position_size: f64::from_bits(self.position_size.load(Ordering::Relaxed)),
            unrealized_pnl: f64::from_bits(self.unrealized_pnl.load(Ordering::Relaxed)),
            last_trade_pnl: f64::from_bits(self.last_trade_pnl.load(Ordering::Relaxed)),
            open_positions: self.open_positions.load(Ordering::Relaxed),
            trades_closed: self.trades_closed.load(Ordering::Relaxed),
        }
    }
}
