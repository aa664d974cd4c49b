//! Performance statistics over closed trades and the equity curve.

use bot_core::{Position, PositionStatus};
use serde::Serialize;

/// Aggregate performance figures. All PnL values are net of fees.
#[derive(Debug, Clone, Serialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// 0..1; zero when no trades have closed.
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// Gross profit over gross loss. Infinite when there are wins and no
    /// losses, zero when there are no wins.
    pub profit_factor: f64,
    pub net_pnl: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Worst peak-to-trough equity decline as a fraction, always <= 0.
    pub max_drawdown: f64,
    /// Per-observation Sharpe over equity returns, scaled by sqrt(N).
    pub sharpe: f64,
}

impl TradeStats {
    /// Compute statistics from the trade list and the equity curve.
    /// Open trades are ignored.
    pub fn compute(trades: &[Position], equity: &[f64]) -> Self {
        let closed: Vec<&Position> = trades
            .iter()
            .filter(|t| t.status == PositionStatus::Closed)
            .collect();

        let total_trades = closed.len();
        let wins = closed.iter().filter(|t| t.realized_pnl > 0.0).count();
        let losses = total_trades - wins;

        let gross_profit: f64 = closed
            .iter()
            .filter(|t| t.realized_pnl > 0.0)
            .map(|t| t.realized_pnl)
            .sum();
        let gross_loss: f64 = closed
            .iter()
            .filter(|t| t.realized_pnl <= 0.0)
            .map(|t| -t.realized_pnl)
            .sum();
        let net_pnl = gross_profit - gross_loss;

        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64
        } else {
            0.0
        };
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let expectancy = if total_trades > 0 {
            net_pnl / total_trades as f64
        } else {
            0.0
        };
        let avg_win = if wins > 0 {
            gross_profit / wins as f64
        } else {
            0.0
        };
        let avg_loss = if losses > 0 {
            gross_loss / losses as f64
        } else {
            0.0
        };

        Self {
            total_trades,
            wins,
            losses,
            win_rate,
            gross_profit,
            gross_loss,
            profit_factor,
            net_pnl,
            expectancy,
            avg_win,
            avg_loss,
            max_drawdown: max_drawdown(equity),
            sharpe: sharpe(equity),
        }
    }

    /// Human-readable summary, suitable for logs and notification bodies.
    pub fn render_report(&self, balance: f64) -> String {
        let profit_factor = if self.profit_factor.is_infinite() {
            "inf".to_string()
        } else {
            format!("{:.2}", self.profit_factor)
        };
        format!(
            "Performance report\n\
             ------------------\n\
             Balance:        {:.2}\n\
             Closed trades:  {} ({} wins / {} losses)\n\
             Win rate:       {:.1}%\n\
             Net PnL:        {:.2}\n\
             Profit factor:  {}\n\
             Expectancy:     {:.2}\n\
             Avg win / loss: {:.2} / {:.2}\n\
             Max drawdown:   {:.2}%\n\
             Sharpe:         {:.2}",
            balance,
            self.total_trades,
            self.wins,
            self.losses,
            self.win_rate * 100.0,
            self.net_pnl,
            profit_factor,
            self.expectancy,
            self.avg_win,
            self.avg_loss,
            self.max_drawdown * 100.0,
            self.sharpe,
        )
    }
}

/// Worst fractional decline from a running equity peak. Zero for flat or
/// rising curves and for fewer than two points.
fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak);
        }
    }
    worst
}

/// Sharpe ratio over point-to-point equity returns, scaled by sqrt(N).
/// Zero when there are fewer than two returns or no variance.
fn sharpe(equity: &[f64]) -> f64 {
    let returns: Vec<f64> = equity
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    mean / std * (n as f64).sqrt()
}
