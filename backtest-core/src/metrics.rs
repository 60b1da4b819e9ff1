//! Performance metrics — pure functions over an equity curve and a trade
//! log. No dependency on the driver or indicator engine; each function
//! takes data in and returns a scalar.

use serde::{Deserialize, Serialize};

use crate::domain::Trade;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub turnover: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
}

impl PerformanceMetrics {
    /// Computes every metric from the driver's per-bar equity curve and
    /// closed-trade log.
    pub fn compute(equity_curve: &[f64], trades: &[Trade], initial_capital: f64) -> Self {
        let bars = equity_curve.len();
        Self {
            total_return: total_return(equity_curve),
            cagr: cagr(equity_curve, bars),
            sharpe: sharpe_ratio(equity_curve, 0.0),
            sortino: sortino_ratio(equity_curve, 0.0),
            calmar: calmar_ratio(equity_curve, bars),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            turnover: turnover(trades, initial_capital, bars),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_losing_streak: avg_losing_streak(trades),
        }
    }
}

fn is_winner(trade: &Trade) -> bool {
    trade.pnl.unwrap_or(0.0) > 0.0
}

pub fn total_return(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    if initial <= 0.0 {
        return 0.0;
    }
    (equity_curve[equity_curve.len() - 1] - initial) / initial
}

/// Assumes 252 bars per year, matching the position-driven annualization
/// used for the other ratio metrics below.
pub fn cagr(equity_curve: &[f64], bars: usize) -> f64 {
    if equity_curve.len() < 2 || bars < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    let final_eq = equity_curve[equity_curve.len() - 1];
    if initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = bars as f64 / 252.0;
    if years <= 0.0 {
        return 0.0;
    }
    (final_eq / initial).powf(1.0 / years) - 1.0
}

pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * 252.0_f64.sqrt()
}

pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);

    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    if downside_sq.is_empty() {
        return 0.0;
    }
    let downside_std = (downside_sq.iter().sum::<f64>() / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * 252.0_f64.sqrt()
}

pub fn calmar_ratio(equity_curve: &[f64], bars: usize) -> f64 {
    let c = cagr(equity_curve, bars);
    let dd = max_drawdown(equity_curve);
    if dd >= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd.abs()
}

/// Negative fraction (e.g. `-0.15` = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| is_winner(t)).count() as f64 / trades.len() as f64
}

/// Gross profit over gross loss, capped at 100.0 for the all-winners case.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter_map(|t| t.pnl).filter(|&p| p > 0.0).sum();
    let gross_loss: f64 = trades.iter().filter_map(|t| t.pnl).filter(|&p| p < 0.0).map(f64::abs).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn turnover(trades: &[Trade], initial_capital: f64, bars: usize) -> f64 {
    if trades.is_empty() || initial_capital <= 0.0 || bars < 2 {
        return 0.0;
    }
    let total_notional: f64 = trades
        .iter()
        .map(|t| t.entry_price * t.quantity + t.exit_price.unwrap_or(t.entry_price) * t.quantity)
        .sum();
    let years = bars as f64 / 252.0;
    if years <= 0.0 {
        return 0.0;
    }
    total_notional / initial_capital / years
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if is_winner(trade) == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

pub fn avg_losing_streak(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let mut streaks = Vec::new();
    let mut current = 0;
    for trade in trades {
        if !is_winner(trade) {
            current += 1;
        } else if current > 0 {
            streaks.push(current);
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        return 0.0;
    }
    streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
}

fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve.windows(2).map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 }).collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
