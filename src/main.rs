//! Portfolio Rebalancer - Main Entry Point
//!
//! Runs one rebalancing pass against Alpaca (paper or live), or against
//! an in-memory mock brokerage with `--mock`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use portfolio_rebalancer::broker::{AlpacaClient, Brokerage, MockBrokerage};
use portfolio_rebalancer::config::Config;
use portfolio_rebalancer::error::RunError;
use portfolio_rebalancer::rebalance::Rebalancer;
use portfolio_rebalancer::runlog::RunLogger;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Portfolio Rebalancer CLI
#[derive(Parser)]
#[command(name = "portfolio-rebalancer")]
#[command(version, about = "Rebalance a brokerage account toward target allocations")]
struct Cli {
    /// Trade against an in-memory mock brokerage instead of Alpaca
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one rebalancing run (the default)
    Run,
    /// Print the account and position snapshot without trading
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "portfolio-rebalancer v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Commands::Run);

    if matches!(&command, Commands::Run) {
        if let Err(e) = config.validate() {
            error!("invalid configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    }

    let broker: Box<dyn Brokerage> = if cli.mock {
        warn!("MOCK MODE - trading against an in-memory brokerage");
        Box::new(MockBrokerage::with_cash(dec!(10_000)))
    } else {
        if config.alpaca.paper {
            info!("paper trading environment selected");
        } else {
            warn!("LIVE trading environment selected - real money at risk");
        }
        match AlpacaClient::new(&config.alpaca) {
            Ok(client) => Box::new(client),
            Err(e) => {
                error!("failed to create Alpaca client: {e:#}");
                return ExitCode::FAILURE;
            }
        }
    };

    let result = match command {
        Commands::Run => run_once(&config, broker.as_ref()).await,
        Commands::Status => show_status(broker.as_ref()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("run failed: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Execute one rebalancing run.
async fn run_once(config: &Config, broker: &dyn Brokerage) -> Result<(), RunError> {
    log_targets(config);

    let rebalancer = Rebalancer::new(config.rebalance.clone(), config.targets.clone());
    let logger = RunLogger::new(&config.rebalance.log_dir);

    let report = rebalancer.run(broker, &logger).await?;

    info!(
        closed = report.closed.len(),
        adjusted = report.adjustments.len(),
        orders = report.orders_submitted,
        log = %report.log_path.display(),
        "rebalancing run complete"
    );
    Ok(())
}

/// Print the account and position snapshot.
async fn show_status(broker: &dyn Brokerage) -> Result<(), RunError> {
    let account = broker.get_account().await?;
    info!("equity:          ${:.2}", account.equity);
    info!("cash:            ${:.2}", account.cash);
    info!("portfolio value: ${:.2}", account.portfolio_value);

    let positions = broker.list_positions().await?;
    if positions.is_empty() {
        info!("no open positions");
    } else {
        info!("open positions:");
        for position in &positions {
            info!(
                "   {}: ${:.2} ({} shares)",
                position.symbol, position.market_value, position.qty
            );
        }
    }
    Ok(())
}

/// Log the configured target allocation on startup.
fn log_targets(config: &Config) {
    info!("target allocation:");
    for target in config.targets.iter() {
        info!("   {}: {:.1}%", target.symbol, target.weight * dec!(100));
    }
    let cash_weight = Decimal::ONE - config.targets.total_weight();
    if cash_weight > Decimal::ZERO {
        info!("   cash: {:.1}%", cash_weight * dec!(100));
    }
}

/// Initialize logging to stdout and a rolling file under `logs/`.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "rebalancer.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the flush guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("portfolio_rebalancer=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(false)
        .init();

    Ok(())
}
