//! Position sizing (§4.6 "Sizing"). A sum type dispatch rather than a
//! `Sizer` trait object per strategy — this system has exactly one
//! sizing decision per entry, driven by a single `PositionSizingType`
//! config field, not a pluggable per-strategy collaborator.

use crate::domain::strategy::PositionSizingType;
use crate::position::open_trade::OpenTradeState;

/// Default Kelly inputs used when no trade-history-derived win rate is
/// available (§4.6).
const KELLY_DEFAULT_WIN_RATE: f64 = 0.55;
const KELLY_DEFAULT_WIN_LOSS_RATIO: f64 = 1.5;
const KELLY_HALF_CAP: f64 = 0.25;

const VOLATILITY_EQUITY_FRACTION: f64 = 0.02;
const VOLATILITY_ATR_MULTIPLE: f64 = 2.0;
const VOLATILITY_FALLBACK_FRACTION: f64 = 0.10;

const MAX_ALLOCATION_FRACTION: f64 = 0.95;

/// Half-Kelly fraction, clipped to `[0, 0.25]`.
fn half_kelly(win_rate: f64, win_loss_ratio: f64) -> f64 {
    let kelly = win_rate - (1.0 - win_rate) / win_loss_ratio;
    (kelly / 2.0).clamp(0.0, KELLY_HALF_CAP)
}

/// Dollar value to allocate to a new entry, before the DCA split and the
/// capital-rejection check (§4.6).
pub fn size_position(
    sizing_type: PositionSizingType,
    sizing_value: f64,
    equity: f64,
    price: f64,
    stop_distance: Option<f64>,
    atr14: f64,
) -> f64 {
    let raw_value = match sizing_type {
        PositionSizingType::FixedPercent => equity * sizing_value / 100.0,
        PositionSizingType::FixedDollar | PositionSizingType::FixedAmount => sizing_value,
        PositionSizingType::RiskPercent => match stop_distance {
            Some(distance) if distance > 0.0 => (equity * sizing_value / 100.0) / distance * price,
            _ => equity * sizing_value / 100.0,
        },
        PositionSizingType::Kelly => equity * half_kelly(KELLY_DEFAULT_WIN_RATE, KELLY_DEFAULT_WIN_LOSS_RATIO),
        PositionSizingType::Volatility => {
            if atr14 > 0.0 {
                (equity * VOLATILITY_EQUITY_FRACTION) / (atr14 * VOLATILITY_ATR_MULTIPLE) * price
            } else {
                equity * VOLATILITY_FALLBACK_FRACTION
            }
        }
        PositionSizingType::AllIn => equity,
    };

    let cap = if matches!(sizing_type, PositionSizingType::AllIn) {
        equity
    } else {
        equity * MAX_ALLOCATION_FRACTION
    };
    raw_value.min(cap).max(0.0)
}

/// Capital not already committed to open positions: `equity - sum(entry *
/// remainingQty)` over every open trade (§4.6).
pub fn available_capital(equity: f64, open_trades: &[OpenTradeState]) -> f64 {
    let committed: f64 = open_trades.iter().map(|t| t.entry_price * t.remaining_qty).sum();
    equity - committed
}

/// Converts a sized dollar value into a quantity, dividing across DCA
/// legs when applicable, and rejecting (quantity 0) when capital is
/// insufficient (§4.6).
pub fn quantity_for_value(value: f64, price: f64, dca_enabled: bool, dca_max_entries: u32, available_capital: f64) -> f64 {
    let per_entry_value = if dca_enabled && dca_max_entries > 1 {
        value / dca_max_entries as f64
    } else {
        value
    };
    if per_entry_value > available_capital {
        return 0.0;
    }
    per_entry_value / price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_percent_sizes_against_equity() {
        let v = size_position(PositionSizingType::FixedPercent, 100.0, 10_000.0, 100.0, None, 0.0);
        assert!((v - 9_500.0).abs() < 1e-9); // capped at 95% of equity
    }

    #[test]
    fn all_in_not_capped_at_ninety_five_percent() {
        let v = size_position(PositionSizingType::AllIn, 0.0, 10_000.0, 100.0, None, 0.0);
        assert_eq!(v, 10_000.0);
    }

    #[test]
    fn risk_percent_falls_back_without_stop_distance() {
        let v = size_position(PositionSizingType::RiskPercent, 5.0, 10_000.0, 100.0, None, 0.0);
        assert!((v - 500.0).abs() < 1e-9);
    }

    #[test]
    fn volatility_falls_back_when_atr_zero() {
        let v = size_position(PositionSizingType::Volatility, 0.0, 10_000.0, 100.0, None, 0.0);
        assert!((v - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn dca_value_split_across_max_entries() {
        let qty = quantity_for_value(1000.0, 100.0, true, 2, 10_000.0);
        assert!((qty - 5.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_capital_rejects_with_zero_quantity() {
        let qty = quantity_for_value(1000.0, 100.0, false, 1, 500.0);
        assert_eq!(qty, 0.0);
    }
}
