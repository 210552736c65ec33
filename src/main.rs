//! Portfolio Optimizer
//!
//! Command-line and web front ends for the risk-constrained allocator.

use clap::{Parser, Subcommand};
use portfolio_optimizer::{
    client::{PriceSource, YahooClient},
    config::Config,
    dashboard::{start_dashboard, DashboardState},
    pipeline,
    render::{render_bars, render_table},
    types::{parse_tickers, LookbackPeriod, RunConfig},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portfolio-optimizer")]
#[command(about = "Maximize expected return under a volatility limit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute an allocation and print it
    Optimize {
        /// Comma-separated tickers
        #[arg(short, long)]
        tickers: Option<String>,
        /// Total investment
        #[arg(short, long)]
        investment: Option<Decimal>,
        /// Maximum annualized volatility (0.05 - 0.5)
        #[arg(short, long)]
        risk: Option<Decimal>,
        /// Historical window: 3y, 5y or 10y
        #[arg(short, long)]
        period: Option<LookbackPeriod>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the single-screen web UI
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show recent closes for one ticker
    Prices {
        ticker: String,
        #[arg(short, long, default_value = "5y")]
        period: LookbackPeriod,
        /// Number of most recent closes to show
        #[arg(short = 'n', long, default_value = "10")]
        tail: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Optimize {
            tickers,
            investment,
            risk,
            period,
            json,
        } => {
            let defaults = config.defaults.clone();
            let run = RunConfig::new(
                tickers.map(|t| parse_tickers(&t)).unwrap_or(defaults.tickers),
                investment.unwrap_or(defaults.total_investment),
                risk.unwrap_or(defaults.risk_tolerance),
                period.unwrap_or(defaults.lookback),
            )?;
            optimize(config, run, json).await
        }
        Commands::Serve { port } => serve(config, port).await,
        Commands::Prices {
            ticker,
            period,
            tail,
        } => show_prices(config, &ticker, period, tail).await,
    }
}

async fn optimize(config: Config, run: RunConfig, json: bool) -> anyhow::Result<()> {
    let client = YahooClient::new(&config.data)?;
    let report = pipeline::run(&client, &run, &config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_table(&report));
        println!("{}", render_bars(&report, 40));
    }
    Ok(())
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let client = YahooClient::new(&config.data)?;
    let host = config.server.host.clone();
    let port = port.unwrap_or(config.server.port);

    let state = Arc::new(DashboardState::new(Arc::new(client), config));
    start_dashboard(state, &host, port).await?;
    Ok(())
}

async fn show_prices(
    config: Config,
    ticker: &str,
    period: LookbackPeriod,
    tail: usize,
) -> anyhow::Result<()> {
    let client = YahooClient::new(&config.data)?;
    let series = client.fetch(ticker.trim(), period).await?;

    println!(
        "{}: {} closes from {} to {}",
        series.ticker,
        series.len(),
        series.first_date().map(|d| d.to_string()).unwrap_or_default(),
        series.last_date().map(|d| d.to_string()).unwrap_or_default()
    );
    for point in series.points.iter().rev().take(tail).rev() {
        println!("{}  {:>12.4}", point.date, point.close);
    }
    Ok(())
}
