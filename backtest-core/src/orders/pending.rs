//! `PendingOrder` — the single outstanding non-MARKET entry intent (§3,
//! §4.3).

use crate::domain::strategy::{EntryOrderType, OffsetUnit};
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarOutcome {
    StillPending,
    Filled { price: f64 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub signal_bar: usize,
    pub signal_price: f64,
    pub order_type: EntryOrderType,
    /// Computed fill trigger price for LIMIT/STOP.
    pub order_price: f64,
    /// Live-updated trailing reference for TRAILING.
    pub trail_price: f64,
    pub trailing_reverse_percent: f64,
    pub expiration_bar: Option<usize>,
    pub is_long: bool,
}

impl PendingOrder {
    /// `atr14_at_signal` is `ATR(14)` evaluated at `signal_bar`, used only
    /// when `offset_unit = Atr` (§4.3 offset computation).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signal_bar: usize,
        signal_price: f64,
        order_type: EntryOrderType,
        offset_unit: OffsetUnit,
        offset_value: f64,
        trailing_reverse_percent: f64,
        expiration_bars: Option<u32>,
        is_long: bool,
        atr14_at_signal: f64,
    ) -> Self {
        let delta = match offset_unit {
            OffsetUnit::Percent => signal_price * offset_value / 100.0,
            OffsetUnit::Atr => offset_value * atr14_at_signal,
        };
        let order_price = signal_price + delta;
        Self {
            signal_bar,
            signal_price,
            order_type,
            order_price,
            trail_price: signal_price,
            trailing_reverse_percent,
            expiration_bar: expiration_bars.map(|bars| signal_bar + bars as usize),
            is_long,
        }
    }

    /// Processing order: (1) expiration, (2) fill check, (3) remain
    /// pending otherwise (§4.3).
    pub fn process_bar(&mut self, candle: &Candle, bar_index: usize) -> BarOutcome {
        if let Some(expiration_bar) = self.expiration_bar {
            if bar_index > expiration_bar {
                return BarOutcome::Expired;
            }
        }

        match self.order_type {
            EntryOrderType::Limit => {
                let fills = if self.is_long {
                    candle.low <= self.order_price
                } else {
                    candle.high >= self.order_price
                };
                if fills {
                    BarOutcome::Filled { price: self.order_price }
                } else {
                    BarOutcome::StillPending
                }
            }
            EntryOrderType::Stop => {
                let fills = if self.is_long {
                    candle.high >= self.order_price
                } else {
                    candle.low <= self.order_price
                };
                if fills {
                    BarOutcome::Filled { price: self.order_price }
                } else {
                    BarOutcome::StillPending
                }
            }
            EntryOrderType::Trailing => {
                if self.is_long {
                    self.trail_price = self.trail_price.min(candle.low);
                    let trigger = self.trail_price * (1.0 + self.trailing_reverse_percent / 100.0);
                    if candle.close >= trigger {
                        BarOutcome::Filled { price: candle.close }
                    } else {
                        BarOutcome::StillPending
                    }
                } else {
                    self.trail_price = self.trail_price.max(candle.high);
                    let trigger = self.trail_price * (1.0 - self.trailing_reverse_percent / 100.0);
                    if candle.close <= trigger {
                        BarOutcome::Filled { price: candle.close }
                    } else {
                        BarOutcome::StillPending
                    }
                }
            }
            EntryOrderType::Market => BarOutcome::StillPending,
        }
    }
}
