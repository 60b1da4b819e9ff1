//! backtest-cli — run a strategy backtest against a candle file and print
//! a summary, plus write the full `BacktestResult` as JSON.
//!
//! This binary is the one piece of filesystem I/O the spec allows (§1
//! "out of scope: external collaborators ... persisting configuration").
//! `backtest-core::run` itself never touches disk; this crate only loads a
//! strategy JSON file and a candle CSV/JSON file, builds the
//! `BacktestConfig`/`BacktestContext`, and hands them to the core.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use backtest_core::domain::{BacktestConfig, BacktestContext, Candle, MarketType, PositionSizingType, Strategy};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "backtest-cli")]
#[command(about = "Run a strategy backtest against historical candles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one backtest and print a summary plus write the full result as JSON.
    Run {
        /// Path to a strategy JSON file (the `Strategy` wire shape).
        #[arg(short, long)]
        strategy: PathBuf,

        /// Path to a candle file: `.csv` with a header
        /// `timestamp,open,high,low,close,volume`, or `.json` with an
        /// array of the same fields.
        #[arg(short, long)]
        candles: PathBuf,

        /// Ticker symbol, recorded in the result only.
        #[arg(long, default_value = "SYMBOL")]
        symbol: String,

        /// Candle resolution: one of 1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w.
        #[arg(long, default_value = "1h")]
        resolution: String,

        /// Start date label, recorded in the result only.
        #[arg(long, default_value = "")]
        start_date: String,

        /// End date label, recorded in the result only.
        #[arg(long, default_value = "")]
        end_date: String,

        /// Initial capital.
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,

        /// Commission, percent of exited notional, applied symmetrically
        /// on entry and on each exit event.
        #[arg(long, default_value_t = 0.0)]
        commission: f64,

        /// Position sizing mode.
        #[arg(long, value_enum, default_value_t = CliSizingType::FixedPercent)]
        sizing_type: CliSizingType,

        /// Position sizing value (percent, dollars, or the mode's unit).
        #[arg(long, default_value_t = 100.0)]
        sizing_value: f64,

        /// Market type, affecting holding-cost accrual.
        #[arg(long, value_enum, default_value_t = CliMarketType::Spot)]
        market_type: CliMarketType,

        /// Hourly margin interest rate, percent. Only used when `market-type = margin`.
        #[arg(long, default_value_t = 0.0)]
        margin_interest_hourly: f64,

        /// Where to write the full `BacktestResult` as JSON. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliSizingType {
    FixedPercent,
    FixedDollar,
    FixedAmount,
    RiskPercent,
    Kelly,
    Volatility,
    AllIn,
}

impl From<CliSizingType> for PositionSizingType {
    fn from(value: CliSizingType) -> Self {
        match value {
            CliSizingType::FixedPercent => PositionSizingType::FixedPercent,
            CliSizingType::FixedDollar => PositionSizingType::FixedDollar,
            CliSizingType::FixedAmount => PositionSizingType::FixedAmount,
            CliSizingType::RiskPercent => PositionSizingType::RiskPercent,
            CliSizingType::Kelly => PositionSizingType::Kelly,
            CliSizingType::Volatility => PositionSizingType::Volatility,
            CliSizingType::AllIn => PositionSizingType::AllIn,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliMarketType {
    Spot,
    Futures,
    Margin,
}

impl From<CliMarketType> for MarketType {
    fn from(value: CliMarketType) -> Self {
        match value {
            CliMarketType::Spot => MarketType::Spot,
            CliMarketType::Futures => MarketType::Futures,
            CliMarketType::Margin => MarketType::Margin,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            strategy,
            candles,
            symbol,
            resolution,
            start_date,
            end_date,
            capital,
            commission,
            sizing_type,
            sizing_value,
            market_type,
            margin_interest_hourly,
            output,
        } => run_command(
            &strategy,
            &candles,
            symbol,
            resolution,
            start_date,
            end_date,
            capital,
            commission,
            sizing_type.into(),
            sizing_value,
            market_type.into(),
            margin_interest_hourly,
            output.as_deref(),
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_command(
    strategy_path: &PathBuf,
    candles_path: &PathBuf,
    symbol: String,
    resolution: String,
    start_date: String,
    end_date: String,
    initial_capital: f64,
    commission: f64,
    position_sizing_type: PositionSizingType,
    position_sizing_value: f64,
    market_type: MarketType,
    margin_interest_hourly: f64,
    output: Option<&std::path::Path>,
) -> Result<()> {
    info!(path = %strategy_path.display(), "loading strategy");
    let strategy = load_strategy(strategy_path)?;

    info!(path = %candles_path.display(), "loading candles");
    let candles = load_candles(candles_path)?;
    info!(count = candles.len(), "candles loaded");

    let config = BacktestConfig {
        symbol,
        resolution,
        start_date,
        end_date,
        initial_capital,
        commission,
        position_sizing_type,
        position_sizing_value,
        market_type,
        margin_interest_hourly,
    };
    let ctx = BacktestContext { candles, ..Default::default() };

    info!("running backtest");
    let result = backtest_core::run(&strategy, &config, &ctx, None);

    print_summary(&result);

    let json = serde_json::to_string_pretty(&result).context("serializing backtest result")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing result to {}", path.display()))?;
            info!(path = %path.display(), "result written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn load_strategy(path: &PathBuf) -> Result<Strategy> {
    let file = File::open(path).with_context(|| format!("opening strategy file {}", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("parsing strategy JSON from {}", path.display()))
}

fn load_candles(path: &PathBuf) -> Result<Vec<Candle>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let file = File::open(path).with_context(|| format!("opening candle file {}", path.display()))?;
            serde_json::from_reader(file).with_context(|| format!("parsing candle JSON from {}", path.display()))
        }
        _ => load_candles_csv(path),
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvCandle {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn load_candles_csv(path: &PathBuf) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening candle CSV {}", path.display()))?;
    let mut candles = Vec::new();
    for record in reader.deserialize() {
        let row: CsvCandle = record.context("parsing candle CSV row")?;
        candles.push(Candle {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(candles)
}

fn print_summary(result: &backtest_core::domain::BacktestResult) {
    println!("strategy: {} ({})", result.strategy_name, result.strategy_id);
    println!("run id:   {}", result.run_id);
    println!("config:   {}", result.config_hash);
    println!("bars evaluated: {}", result.bars_evaluated);
    println!("trades:         {}", result.metrics.trade_count);
    println!("win rate:       {:.2}%", result.metrics.win_rate * 100.0);
    println!("total return:   {:.2}%", result.metrics.total_return * 100.0);
    println!("max drawdown:   {:.2}%", result.metrics.max_drawdown * 100.0);
    println!("sharpe:         {:.2}", result.metrics.sharpe);
    println!("profit factor:  {:.2}", result.metrics.profit_factor);
    println!("duration:       {} ms", result.duration_ms);
    if !result.errors.is_empty() {
        println!("errors ({}):", result.errors.len());
        for err in &result.errors {
            println!("  - {err}");
        }
    }
}
