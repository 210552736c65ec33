//! Conic solver backend
//!
//! The allocation problem
//!
//! ```text
//! minimize    cᵀ w
//! subject to  Σ wᵢ = 1
//!             lᵢ ≤ wᵢ ≤ uᵢ
//!             sqrt(wᵀ Σ w) ≤ r
//! ```
//!
//! is a second-order cone program once Σ is factored as F Fᵀ: the risk bound
//! becomes `‖Fᵀ w‖₂ ≤ r`. It is handed to Clarabel in the standard form
//! `A w + s = b, s ∈ K`.

use crate::config::OptimizerConfig;
use crate::error::{PortfolioError, Result};
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome reported by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Converged to the requested tolerances
    Optimal,
    /// Converged to reduced tolerances
    AlmostOptimal,
    /// No point satisfies all constraints
    Infeasible,
    /// Objective unbounded below
    Unbounded,
    /// Iteration or time budget exhausted
    IterationLimit,
    /// Solver stalled or hit numerical trouble
    NumericalError,
    Unknown,
}

impl SolveStatus {
    /// Whether the stopping criteria were met
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Optimal | Self::AlmostOptimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Optimal => "optimal",
            Self::AlmostOptimal => "almost optimal",
            Self::Infeasible => "infeasible",
            Self::Unbounded => "unbounded",
            Self::IterationLimit => "iteration limit",
            Self::NumericalError => "numerical error",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved => Self::Optimal,
            SolverStatus::AlmostSolved => Self::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Self::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => Self::Unbounded,
            SolverStatus::MaxIterations | SolverStatus::MaxTime => Self::IterationLimit,
            SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
                Self::NumericalError
            }
            _ => Self::Unknown,
        }
    }
}

/// Interior-point settings
#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub verbose: bool,
    pub max_iter: u32,
    /// Time limit in seconds
    pub time_limit: f64,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
    pub tol_feas: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            max_iter: 200,
            time_limit: f64::INFINITY,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            tol_feas: 1e-8,
        }
    }
}

impl From<&OptimizerConfig> for SolverSettings {
    fn from(config: &OptimizerConfig) -> Self {
        Self {
            verbose: config.verbose,
            max_iter: config.max_iter,
            time_limit: config.time_limit_secs.unwrap_or(f64::INFINITY),
            tol_gap_abs: config.tol_gap_abs,
            tol_gap_rel: config.tol_gap_rel,
            tol_feas: config.tol_feas,
        }
    }
}

/// Raw solver result
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub weights: Vec<f64>,
    pub status: SolveStatus,
    pub iterations: u32,
    /// cᵀ w at the returned point
    pub objective: f64,
    /// Solve time in seconds
    pub solve_time: f64,
}

impl QpSolution {
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }
}

/// Minimize `objectiveᵀ w` under the full-investment, box and volatility constraints.
///
/// Never fails on infeasibility or non-convergence; those are reported through
/// `status`. Errors are reserved for malformed input.
pub fn solve_constrained_qp(
    objective: &[f64],
    covariance: &DMatrix<f64>,
    risk_limit: f64,
    bounds: &[(f64, f64)],
    settings: &SolverSettings,
) -> Result<QpSolution> {
    let n = objective.len();
    if n == 0 {
        return Err(PortfolioError::InvalidInput("empty objective".into()));
    }
    if bounds.len() != n {
        return Err(PortfolioError::DimensionMismatch {
            expected: n,
            actual: bounds.len(),
        });
    }
    if covariance.nrows() != n || covariance.ncols() != n {
        return Err(PortfolioError::DimensionMismatch {
            expected: n,
            actual: covariance.nrows(),
        });
    }
    if !(risk_limit.is_finite() && risk_limit > 0.0) {
        return Err(PortfolioError::InvalidInput(format!(
            "risk limit must be positive, got {}",
            risk_limit
        )));
    }
    for (i, &(lower, upper)) in bounds.iter().enumerate() {
        if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
            return Err(PortfolioError::InvalidInput(format!(
                "invalid bounds [{}, {}] for weight {}",
                lower, upper, i
            )));
        }
    }

    let factor = risk_factor(covariance);

    // Rows: [sum] [lower bounds] [upper bounds] [cone head] [factor rows]
    let soc_start = 2 * n + 1;
    let n_rows = soc_start + 1 + n;

    let mut colptr = Vec::with_capacity(n + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..n {
        rowval.push(0);
        nzval.push(1.0);
        rowval.push(1 + j);
        nzval.push(-1.0);
        rowval.push(1 + n + j);
        nzval.push(1.0);
        for k in 0..n {
            let v = factor[(k, j)];
            if v != 0.0 {
                rowval.push(soc_start + 1 + k);
                nzval.push(-v);
            }
        }
        colptr.push(rowval.len());
    }
    let a = CscMatrix::new(n_rows, n, colptr, rowval, nzval);
    let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());

    let mut b = Vec::with_capacity(n_rows);
    b.push(1.0);
    b.extend(bounds.iter().map(|&(lower, _)| -lower));
    b.extend(bounds.iter().map(|&(_, upper)| upper));
    b.push(risk_limit);
    b.extend(std::iter::repeat(0.0).take(n));

    let cones = vec![
        SupportedConeT::ZeroConeT(1),
        SupportedConeT::NonnegativeConeT(2 * n),
        SupportedConeT::SecondOrderConeT(n + 1),
    ];

    let clarabel_settings = DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .time_limit(settings.time_limit)
        .tol_gap_abs(settings.tol_gap_abs)
        .tol_gap_rel(settings.tol_gap_rel)
        .tol_feas(settings.tol_feas)
        .build()
        .map_err(|e| PortfolioError::Solver(e.to_string()))?;

    let mut solver = DefaultSolver::new(&p, objective, &a, &b, &cones, clarabel_settings);
    solver.solve();

    let status: SolveStatus = solver.solution.status.into();
    let weights = solver.solution.x.clone();
    let value = objective.iter().zip(weights.iter()).map(|(c, w)| c * w).sum();

    tracing::debug!(
        "Clarabel finished: status={} iterations={} time={:.4}s",
        status,
        solver.info.iterations,
        solver.solution.solve_time
    );

    Ok(QpSolution {
        weights,
        status,
        iterations: solver.info.iterations,
        objective: value,
        solve_time: solver.solution.solve_time,
    })
}

/// `Fᵀ` with `Σ = F Fᵀ`, from the eigen-decomposition of the symmetrized
/// covariance. Negative eigenvalues are clipped to zero.
fn risk_factor(covariance: &DMatrix<f64>) -> DMatrix<f64> {
    let symmetric = (covariance + covariance.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(symmetric);
    let n = covariance.nrows();
    DMatrix::from_fn(n, n, |k, j| {
        let lambda = eigen.eigenvalues[k].max(0.0);
        lambda.sqrt() * eigen.eigenvectors[(j, k)]
    })
}
