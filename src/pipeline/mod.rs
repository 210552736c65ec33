//! # Allocation pipeline
//!
//! FetchPrices → ComputeStatistics → Optimize → ProjectResults for one
//! immutable [`RunConfig`]. Any stage failure aborts the run; nothing partial
//! is returned.


use crate::client::{fetch_all, PriceSource};
use crate::config::{Config, ConvergencePolicy};
use crate::error::{PortfolioError, Result};
use crate::portfolio::{project, AllocationOptimizer, AllocationReport, SolveStatus};
use crate::stats;
use crate::types::RunConfig;
use rust_decimal::prelude::*;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Run the full allocation for `run` against `source`
pub async fn run(source: &dyn PriceSource, run: &RunConfig, config: &Config) -> Result<AllocationReport> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id, tickers = %run.tickers.join(","));
    execute(source, run, config, run_id).instrument(span).await
}

async fn execute(
    source: &dyn PriceSource,
    run: &RunConfig,
    config: &Config,
    run_id: Uuid,
) -> Result<AllocationReport> {
    run.validate()?;
    let capital = run.total_investment.to_f64().ok_or_else(|| {
        PortfolioError::InvalidInput(format!("unrepresentable investment {}", run.total_investment))
    })?;
    let risk_limit = run.risk_tolerance.to_f64().ok_or_else(|| {
        PortfolioError::InvalidInput(format!("unrepresentable risk tolerance {}", run.risk_tolerance))
    })?;

    info!(
        "Starting run: {} tickers, capital {}, risk tolerance {}, lookback {}",
        run.tickers.len(),
        run.total_investment,
        run.risk_tolerance,
        run.lookback
    );

    let series = fetch_all(
        source,
        &run.tickers,
        run.lookback,
        config.data.max_concurrent_fetches,
    )
    .await?;

    let statistics = stats::compute(&series, config.optimizer.trading_days)?;

    let optimizer = AllocationOptimizer::from_config(&config.optimizer);
    let allocation = optimizer.optimize_bundle(&statistics, capital, risk_limit)?;

    let mut warnings = Vec::new();
    match allocation.status {
        status if status.is_converged() => {}
        SolveStatus::Infeasible => {
            return Err(PortfolioError::InfeasibleConstraints { risk_limit });
        }
        status => match config.optimizer.non_convergence {
            ConvergencePolicy::Fail => {
                return Err(PortfolioError::OptimizationDidNotConverge {
                    iterations: allocation.iterations,
                    status,
                });
            }
            ConvergencePolicy::Warn => {
                let message = format!(
                    "Optimizer stopped with status '{}' after {} iterations; weights may not be optimal",
                    status, allocation.iterations
                );
                warn!("{}", message);
                warnings.push(message);
            }
        },
    }

    let mut report = project(&allocation, &statistics, run.total_investment)?;
    report.run_id = Some(run_id);
    report.warnings = warnings;

    info!(
        "Run complete: expected return {} at volatility {:.4} ({} observations)",
        report.summary.expected_return_amount, report.summary.volatility, report.observations
    );

    Ok(report)
}
