//! # Portfolio Optimization Module
//!
//! Maximizes the expected monetary return of a long-only, fully invested
//! portfolio subject to an upper bound on annualized volatility:
//!
//! - objective: `Σ μᵢ wᵢ · capital`
//! - constraints: `Σ wᵢ = 1`, `0 ≤ wᵢ ≤ 1`, `sqrt(wᵀ Σ w) ≤ risk_limit`
//!
//! ```rust,ignore
//! use portfolio_optimizer::portfolio::AllocationOptimizer;
//!
//! let optimizer = AllocationOptimizer::new();
//! let allocation = optimizer.optimize(&means, &covariance, 5_000_000.0, 0.15, &assets)?;
//! let allocation = allocation.ensure_converged()?;
//! ```

pub mod projector;
pub mod solver;


pub use projector::{project, project_rows, AllocationReport, AllocationResult, PortfolioSummary};
pub use solver::{solve_constrained_qp, QpSolution, SolveStatus, SolverSettings};

use crate::config::OptimizerConfig;
use crate::error::{PortfolioError, Result};
use crate::stats::{portfolio_volatility, StatisticsBundle};
use nalgebra::DMatrix;
use tracing::{debug, info, warn};

/// Slack allowed on the volatility bound before a converged point is rejected
pub const DEFAULT_FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Optimized weights and solver diagnostics
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Asset identifiers (same order as weights)
    pub assets: Vec<String>,
    pub weights: Vec<f64>,
    pub status: SolveStatus,
    pub iterations: u32,
    /// Expected monetary return `Σ μᵢ wᵢ · capital`
    pub objective: f64,
    /// Annualized volatility of the weights
    pub volatility: f64,
    pub risk_limit: f64,
}

impl Allocation {
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Turn a failed solve into the matching error
    pub fn ensure_converged(self) -> Result<Self> {
        match self.status {
            s if s.is_converged() => Ok(self),
            SolveStatus::Infeasible => Err(PortfolioError::InfeasibleConstraints {
                risk_limit: self.risk_limit,
            }),
            status => Err(PortfolioError::OptimizationDidNotConverge {
                iterations: self.iterations,
                status,
            }),
        }
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Effective number of assets, `1 / Σ wᵢ²`
    pub fn effective_n(&self) -> f64 {
        let sum_sq: f64 = self.weights.iter().map(|w| w * w).sum();
        if sum_sq > 0.0 {
            1.0 / sum_sq
        } else {
            self.weights.len() as f64
        }
    }
}

/// Risk-constrained return maximizer
#[derive(Debug, Clone)]
pub struct AllocationOptimizer {
    settings: SolverSettings,
    feasibility_tolerance: f64,
}

impl Default for AllocationOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationOptimizer {
    pub fn new() -> Self {
        Self {
            settings: SolverSettings::default(),
            feasibility_tolerance: DEFAULT_FEASIBILITY_TOLERANCE,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            settings: SolverSettings::from(config),
            feasibility_tolerance: config.feasibility_tolerance,
        }
    }

    /// Set max iterations
    pub fn with_max_iterations(mut self, max_iter: u32) -> Self {
        self.settings.max_iter = max_iter;
        self
    }

    /// Optimize straight from a statistics bundle
    pub fn optimize_bundle(
        &self,
        stats: &StatisticsBundle,
        capital: f64,
        risk_limit: f64,
    ) -> Result<Allocation> {
        self.optimize(
            &stats.mean_returns,
            &stats.covariance,
            capital,
            risk_limit,
            &stats.assets,
        )
    }

    /// Solve for the weights.
    ///
    /// Infeasibility and non-convergence come back as an `Allocation` with the
    /// corresponding status; only malformed input is an error.
    pub fn optimize(
        &self,
        mean_returns: &[f64],
        covariance: &DMatrix<f64>,
        capital: f64,
        risk_limit: f64,
        assets: &[String],
    ) -> Result<Allocation> {
        let n = assets.len();
        validate_inputs(mean_returns, covariance, capital, risk_limit, assets)?;

        if n == 1 {
            return Ok(self.single_asset(mean_returns[0], covariance[(0, 0)], capital, risk_limit, assets));
        }

        let uniform = vec![1.0 / n as f64; n];
        let uniform_vol = portfolio_volatility(covariance, &uniform);
        debug!(
            "Uniform allocation volatility {:.4} against limit {:.4}{}",
            uniform_vol,
            risk_limit,
            if uniform_vol > risk_limit { " (violates)" } else { "" }
        );

        let objective: Vec<f64> = mean_returns.iter().map(|m| -m).collect();
        let bounds = vec![(0.0, 1.0); n];
        let solution =
            solve_constrained_qp(&objective, covariance, risk_limit, &bounds, &self.settings)?;

        let mut status = solution.status;
        // Interior-point iterates sit a hair inside or outside the box
        let weights: Vec<f64> = solution.weights.iter().map(|w| w.clamp(0.0, 1.0)).collect();
        let volatility = portfolio_volatility(covariance, &weights);
        let expected: f64 = mean_returns.iter().zip(weights.iter()).map(|(m, w)| m * w).sum();

        if status.is_converged()
            && violates_constraints(&weights, covariance, risk_limit, self.feasibility_tolerance)
        {
            warn!(
                "Solver reported {} but the point violates constraints: volatility {:.6} (limit {:.6}), weight sum {:.6}",
                status,
                volatility,
                risk_limit,
                weights.iter().sum::<f64>()
            );
            status = SolveStatus::NumericalError;
        }

        if status.is_converged() {
            info!(
                "Optimized {} assets in {} iterations: expected return {:.2}, volatility {:.4}",
                n, solution.iterations, expected * capital, volatility
            );
        } else {
            warn!(
                "Optimization ended with status {} after {} iterations",
                status, solution.iterations
            );
        }

        Ok(Allocation {
            assets: assets.to_vec(),
            weights,
            status,
            iterations: solution.iterations,
            objective: expected * capital,
            volatility,
            risk_limit,
        })
    }

    /// With one asset the only admissible weight is 1
    fn single_asset(
        &self,
        mean: f64,
        variance: f64,
        capital: f64,
        risk_limit: f64,
        assets: &[String],
    ) -> Allocation {
        let volatility = variance.max(0.0).sqrt();
        let status = if volatility <= risk_limit + self.feasibility_tolerance {
            SolveStatus::Optimal
        } else {
            warn!(
                "{} volatility {:.4} exceeds limit {:.4}",
                assets[0], volatility, risk_limit
            );
            SolveStatus::Infeasible
        };

        Allocation {
            assets: assets.to_vec(),
            weights: vec![1.0],
            status,
            iterations: 0,
            objective: mean * capital,
            volatility,
            risk_limit,
        }
    }
}

/// True when `weights` breaks the budget, the box or the volatility bound by
/// more than `tolerance`
pub(crate) fn violates_constraints(
    weights: &[f64],
    covariance: &DMatrix<f64>,
    risk_limit: f64,
    tolerance: f64,
) -> bool {
    let sum: f64 = weights.iter().sum();
    (sum - 1.0).abs() > tolerance
        || weights.iter().any(|&w| w < -tolerance || w > 1.0 + tolerance)
        || portfolio_volatility(covariance, weights) > risk_limit + tolerance
}

fn validate_inputs(
    mean_returns: &[f64],
    covariance: &DMatrix<f64>,
    capital: f64,
    risk_limit: f64,
    assets: &[String],
) -> Result<()> {
    let n = assets.len();
    if n == 0 {
        return Err(PortfolioError::InvalidInput("no assets to allocate".into()));
    }
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
    if !(capital.is_finite() && capital > 0.0) {
        return Err(PortfolioError::InvalidInput(format!(
            "capital must be positive, got {}",
            capital
        )));
    }
    if !(risk_limit.is_finite() && risk_limit > 0.0) {
        return Err(PortfolioError::InvalidInput(format!(
            "risk limit must be positive, got {}",
            risk_limit
        )));
    }
    if let Some(i) = mean_returns.iter().position(|m| !m.is_finite()) {
        return Err(PortfolioError::InvalidInput(format!(
            "non-finite mean return for {}",
            assets[i]
        )));
    }
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(PortfolioError::InvalidInput(
            "covariance contains non-finite values".into(),
        ));
    }
    if let Some(i) = (0..n).find(|&i| covariance[(i, i)] < 0.0) {
        return Err(PortfolioError::InvalidInput(format!(
            "negative variance for {}",
            assets[i]
        )));
    }
    Ok(())
}
