//! # Return Statistics
//!
//! Turns per-ticker closing prices into the inputs of the allocation problem:
//! - inner join of all series on trading date
//! - simple daily returns `p[t] / p[t-1] - 1`, dropping rows with non-finite values
//! - sample mean, standard deviation and covariance (n - 1 denominator)
//! - annualization by the trading-days factor (mean × T, std × √T, cov × T)


use crate::error::{PortfolioError, Result};
use crate::types::PriceSeries;
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Trading days per year used to annualize daily statistics
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Minimum number of return observations needed for a sample variance
pub const MIN_OBSERVATIONS: usize = 2;

/// Closing prices of several assets on their common dates
#[derive(Debug, Clone)]
pub struct AlignedPrices {
    pub assets: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// Prices `[date][asset]`
    pub rows: Vec<Vec<f64>>,
}

/// Annualized per-asset statistics in a fixed asset ordering
#[derive(Debug, Clone)]
pub struct StatisticsBundle {
    pub assets: Vec<String>,
    /// Annualized mean simple return
    pub mean_returns: Vec<f64>,
    /// Annualized standard deviation of returns
    pub std_devs: Vec<f64>,
    /// Annualized covariance matrix
    pub covariance: DMatrix<f64>,
    /// Number of return rows the statistics were computed from
    pub observations: usize,
    pub trading_days: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl StatisticsBundle {
    /// Build a bundle from already annualized statistics
    pub fn from_parts(
        assets: Vec<String>,
        mean_returns: Vec<f64>,
        covariance: DMatrix<f64>,
        trading_days: u32,
    ) -> Result<Self> {
        let n = assets.len();
        if mean_returns.len() != n {
            return Err(PortfolioError::DimensionMismatch {
                expected: n,
                actual: mean_returns.len(),
            });
        }
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(PortfolioError::DimensionMismatch {
                expected: n,
                actual: covariance.nrows().max(covariance.ncols()),
            });
        }

        let std_devs = (0..n).map(|i| covariance[(i, i)].max(0.0).sqrt()).collect();
        Ok(Self {
            assets,
            mean_returns,
            std_devs,
            covariance,
            observations: 0,
            trading_days,
            start_date: None,
            end_date: None,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Correlation matrix derived from the covariance
    pub fn correlation(&self) -> DMatrix<f64> {
        let n = self.n_assets();
        DMatrix::from_fn(n, n, |i, j| {
            let denom = self.std_devs[i] * self.std_devs[j];
            if denom > 0.0 {
                self.covariance[(i, j)] / denom
            } else if i == j {
                1.0
            } else {
                0.0
            }
        })
    }

    /// Annualized expected return of a weight vector
    pub fn expected_return(&self, weights: &[f64]) -> f64 {
        weights
            .iter()
            .zip(self.mean_returns.iter())
            .map(|(w, r)| w * r)
            .sum()
    }

    /// Annualized volatility `sqrt(wᵀ Σ w)` of a weight vector
    pub fn portfolio_volatility(&self, weights: &[f64]) -> f64 {
        portfolio_volatility(&self.covariance, weights)
    }
}

/// `sqrt(wᵀ Σ w)`, clamped at zero for slightly indefinite matrices
pub fn portfolio_volatility(covariance: &DMatrix<f64>, weights: &[f64]) -> f64 {
    let w = DVector::from_column_slice(weights);
    let variance = w.dot(&(covariance * &w));
    variance.max(0.0).sqrt()
}

/// Simple period-over-period returns of one price sequence
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return Vec::new();
    }
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Keep only the dates present in every series
pub fn align(series: &[PriceSeries]) -> Result<AlignedPrices> {
    if series.is_empty() {
        return Err(PortfolioError::InvalidInput("no price series supplied".into()));
    }

    let mut seen = HashSet::new();
    for s in series {
        if !seen.insert(s.ticker.as_str()) {
            return Err(PortfolioError::InvalidInput(format!(
                "duplicate price series for {}",
                s.ticker
            )));
        }
    }

    let lookups: Vec<HashMap<NaiveDate, f64>> = series
        .iter()
        .map(|s| s.points.iter().map(|p| (p.date, p.close)).collect())
        .collect();

    let mut table: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    'dates: for point in &series[0].points {
        let mut row = Vec::with_capacity(series.len());
        for lookup in &lookups {
            match lookup.get(&point.date) {
                Some(&close) => row.push(close),
                None => continue 'dates,
            }
        }
        table.insert(point.date, row);
    }

    let (dates, rows): (Vec<NaiveDate>, Vec<Vec<f64>>) = table.into_iter().unzip();
    Ok(AlignedPrices {
        assets: series.iter().map(|s| s.ticker.clone()).collect(),
        dates,
        rows,
    })
}

/// Compute annualized statistics from raw price series.
///
/// Fails with `InsufficientData` when fewer than two usable return rows
/// remain after alignment and dropping non-finite returns.
pub fn compute(series: &[PriceSeries], trading_days: u32) -> Result<StatisticsBundle> {
    if trading_days == 0 {
        return Err(PortfolioError::InvalidInput(
            "trading_days must be at least 1".into(),
        ));
    }

    let aligned = align(series)?;
    let n = aligned.assets.len();

    let mut returns: Vec<Vec<f64>> = Vec::with_capacity(aligned.rows.len().saturating_sub(1));
    let mut return_dates = Vec::with_capacity(returns.capacity());
    let mut dropped = 0usize;
    for t in 1..aligned.rows.len() {
        let row: Vec<f64> = (0..n)
            .map(|i| aligned.rows[t][i] / aligned.rows[t - 1][i] - 1.0)
            .collect();
        if row.iter().all(|r| r.is_finite()) {
            returns.push(row);
            return_dates.push(aligned.dates[t]);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} return rows with non-finite values", dropped);
    }

    let observations = returns.len();
    if observations < MIN_OBSERVATIONS {
        return Err(PortfolioError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: observations,
        });
    }

    // Daily sample moments
    let count = observations as f64;
    let mut means = vec![0.0; n];
    for row in &returns {
        for (j, &r) in row.iter().enumerate() {
            means[j] += r;
        }
    }
    for m in &mut means {
        *m /= count;
    }

    let mut covariance = DMatrix::<f64>::zeros(n, n);
    for row in &returns {
        for i in 0..n {
            let dev_i = row[i] - means[i];
            for j in i..n {
                covariance[(i, j)] += dev_i * (row[j] - means[j]);
            }
        }
    }

    let factor = trading_days as f64;
    for i in 0..n {
        for j in i..n {
            let value = covariance[(i, j)] / (count - 1.0) * factor;
            covariance[(i, j)] = value;
            covariance[(j, i)] = value;
        }
    }

    let mean_returns: Vec<f64> = means.iter().map(|m| m * factor).collect();
    let std_devs: Vec<f64> = (0..n).map(|i| covariance[(i, i)].max(0.0).sqrt()).collect();

    tracing::info!(
        "Computed statistics for {} assets over {} observations",
        n,
        observations
    );

    let bundle = StatisticsBundle {
        assets: aligned.assets,
        mean_returns,
        std_devs,
        covariance,
        observations,
        trading_days,
        start_date: return_dates.first().copied(),
        end_date: return_dates.last().copied(),
    };
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("Return correlations for {:?}:{}", bundle.assets, bundle.correlation());
    }
    Ok(bundle)
}
