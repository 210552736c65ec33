//! Projection of weights onto capital amounts

use super::{Allocation, SolveStatus};
use crate::error::{PortfolioError, Result};
use crate::stats::StatisticsBundle;
use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// One row of the allocation table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    pub ticker: String,
    /// Fraction of capital in `[0, 1]`
    pub weight: f64,
    /// `100 · weight`, two decimals
    pub allocation_pct: Decimal,
    pub capital_amount: Decimal,
    /// Annual expected return on the position
    pub expected_return_amount: Decimal,
    /// Standalone annual risk of the position (`σᵢ · wᵢ · capital`)
    pub expected_risk_amount: Decimal,
}

/// Portfolio-level figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub expected_return_amount: Decimal,
    /// Annualized expected return as a fraction
    pub expected_return: f64,
    /// Diversified annualized volatility `sqrt(wᵀ Σ w)`
    pub volatility: f64,
    /// `volatility · capital`
    pub risk_amount: Decimal,
    /// `1 / Σ wᵢ²`
    pub effective_n: f64,
    /// Weighted standalone volatility over diversified volatility
    pub diversification_ratio: f64,
}

/// Everything a presentation layer needs about one run
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub run_id: Option<Uuid>,
    pub rows: Vec<AllocationResult>,
    pub summary: PortfolioSummary,
    pub status: SolveStatus,
    pub converged: bool,
    pub iterations: u32,
    pub warnings: Vec<String>,
    pub total_investment: Decimal,
    pub risk_tolerance: f64,
    pub observations: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AllocationReport {
    pub fn row(&self, ticker: &str) -> Option<&AllocationResult> {
        self.rows.iter().find(|r| r.ticker == ticker)
    }
}

/// Round a float amount to cents
fn money(value: f64) -> Decimal {
    Decimal::try_from(value)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

/// Per-asset monetary figures in the statistics ordering
pub fn project_rows(
    weights: &[f64],
    stats: &StatisticsBundle,
    capital: Decimal,
) -> Result<Vec<AllocationResult>> {
    if weights.len() != stats.n_assets() {
        return Err(PortfolioError::DimensionMismatch {
            expected: stats.n_assets(),
            actual: weights.len(),
        });
    }
    let capital_f = capital.to_f64().unwrap_or(0.0);

    Ok(stats
        .assets
        .iter()
        .zip(weights.iter())
        .enumerate()
        .map(|(i, (ticker, &w))| AllocationResult {
            ticker: ticker.clone(),
            weight: w,
            allocation_pct: money(w * 100.0),
            capital_amount: money(w * capital_f),
            expected_return_amount: money(stats.mean_returns[i] * w * capital_f),
            expected_risk_amount: money(stats.std_devs[i] * w * capital_f),
        })
        .collect())
}

/// Build the full report for an allocation
pub fn project(
    allocation: &Allocation,
    stats: &StatisticsBundle,
    capital: Decimal,
) -> Result<AllocationReport> {
    if allocation.assets != stats.assets {
        return Err(PortfolioError::InvalidInput(
            "allocation and statistics cover different assets".into(),
        ));
    }

    let rows = project_rows(&allocation.weights, stats, capital)?;
    let capital_f = capital.to_f64().unwrap_or(0.0);

    let expected_return = stats.expected_return(&allocation.weights);
    let volatility = stats.portfolio_volatility(&allocation.weights);
    let weighted_vol: f64 = allocation
        .weights
        .iter()
        .zip(stats.std_devs.iter())
        .map(|(w, s)| w * s)
        .sum();
    let diversification_ratio = if volatility > 0.0 {
        weighted_vol / volatility
    } else {
        1.0
    };

    let summary = PortfolioSummary {
        expected_return_amount: money(expected_return * capital_f),
        expected_return,
        volatility,
        risk_amount: money(volatility * capital_f),
        effective_n: allocation.effective_n(),
        diversification_ratio,
    };

    Ok(AllocationReport {
        run_id: None,
        rows,
        summary,
        status: allocation.status,
        converged: allocation.converged(),
        iterations: allocation.iterations,
        warnings: Vec::new(),
        total_investment: capital,
        risk_tolerance: allocation.risk_limit,
        observations: stats.observations,
        start_date: stats.start_date,
        end_date: stats.end_date,
    })
}
