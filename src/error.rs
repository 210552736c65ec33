//! Error types for the allocation pipeline

use crate::portfolio::SolveStatus;
use thiserror::Error;

/// Errors surfaced by fetching, statistics, optimization and configuration
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("No price data available for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("Transient fetch error for {ticker}: {reason}")]
    TransientFetch { ticker: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No allocation satisfies the risk limit of {risk_limit:.4} (fully invested, long-only)")]
    InfeasibleConstraints { risk_limit: f64 },

    #[error("Optimization did not converge after {iterations} iterations (status: {status})")]
    OptimizationDidNotConverge { iterations: u32, status: SolveStatus },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortfolioError {
    /// Whether the failure came from the network or provider rather than the input
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch { .. } | Self::Http(_))
    }

    /// Whether the failure is a statement about the optimization problem itself
    pub fn is_optimization_failure(&self) -> bool {
        matches!(
            self,
            Self::InfeasibleConstraints { .. } | Self::OptimizationDidNotConverge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
