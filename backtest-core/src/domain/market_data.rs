//! Auxiliary market data feeds beyond the candle series: aggregated trades,
//! funding rates, and open interest snapshots. Optional per the indicator
//! engine's `setAggTrades`/`setFundingRates`/`setOpenInterest` contract.

use serde::{Deserialize, Serialize};

/// One aggregated-trade print, as supplied by an exchange's aggTrades feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggTrade {
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
    /// `true` when the buyer was the market maker, i.e. this print was a sell-initiated trade.
    pub is_buyer_maker: bool,
}

impl AggTrade {
    /// Signed notional: positive for taker buys, negative for taker sells.
    pub fn signed_notional(&self) -> f64 {
        let notional = self.price * self.quantity;
        if self.is_buyer_maker {
            -notional
        } else {
            notional
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub timestamp: i64,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenInterest {
    pub timestamp: i64,
    pub open_interest: f64,
}
