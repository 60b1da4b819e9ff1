//! Domain types: candles, ids, market data feeds, strategy configuration,
//! trade records, and the run configuration/result envelope.

pub mod candle;
pub mod config;
pub mod ids;
pub mod market_data;
pub mod strategy;
pub mod trade;

pub use candle::{Candle, Side};
pub use config::{resolution_ms, BacktestConfig, BacktestContext, BacktestResult, Progress, ProgressCallback};
pub use ids::{ConfigHash, GroupIdGen, RunId};
pub use market_data::{AggTrade, FundingRate, OpenInterest};
pub use strategy::{
    DcaMode, EntryOrderType, EntrySettings, ExitBasis, ExitReentry, ExitZone, HoopPatternSettings,
    MarketType, OffsetUnit, PositionSizingType, StopLossType, Strategy, TakeProfitType,
};
pub use trade::{BetterPrice, ExitReason, Trade};
