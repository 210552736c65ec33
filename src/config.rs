//! Configuration management
//!
//! Settings are read from an optional TOML file and overridden by
//! `PORTFOLIO__<SECTION>__<KEY>` environment variables (a `.env` file is
//! loaded first when present).

use crate::error::{PortfolioError, Result};
use crate::types::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Form values used when a run does not specify them
    #[serde(default)]
    pub defaults: RunConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let expanded = PathBuf::from(shellexpand::tilde(path).into_owned());
        if !expanded.exists() {
            tracing::debug!("Config file {} not found, using defaults", expanded.display());
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(expanded).required(false))
            .add_source(
                config::Environment::with_prefix("PORTFOLIO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("defaults.tickers"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data.max_concurrent_fetches == 0 {
            return Err(PortfolioError::InvalidInput(
                "data.max_concurrent_fetches must be at least 1".into(),
            ));
        }
        if self.data.timeout_secs == 0 {
            return Err(PortfolioError::InvalidInput(
                "data.timeout_secs must be at least 1".into(),
            ));
        }
        if self.optimizer.trading_days == 0 {
            return Err(PortfolioError::InvalidInput(
                "optimizer.trading_days must be at least 1".into(),
            ));
        }
        if self.optimizer.max_iter == 0 {
            return Err(PortfolioError::InvalidInput(
                "optimizer.max_iter must be at least 1".into(),
            ));
        }
        if !(self.optimizer.feasibility_tolerance >= 0.0) {
            return Err(PortfolioError::InvalidInput(
                "optimizer.feasibility_tolerance must be non-negative".into(),
            ));
        }
        self.defaults.validate()
    }
}

/// Market-data provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 1 fetches tickers one after another
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Prefer split/dividend adjusted closes when the provider has them
    #[serde(default = "default_true")]
    pub use_adjusted_close: bool,
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            use_adjusted_close: true,
        }
    }
}

/// What to do when the solver stops before meeting its convergence criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergencePolicy {
    /// Return the raw weights flagged as not converged
    #[default]
    Warn,
    /// Abort the run with an error
    Fail,
}

/// Solver and statistics settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    #[serde(default = "default_tolerance")]
    pub tol_gap_abs: f64,
    #[serde(default = "default_tolerance")]
    pub tol_gap_rel: f64,
    #[serde(default = "default_tolerance")]
    pub tol_feas: f64,
    /// Wall-clock budget for one solve; unlimited when absent
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
    /// Allowed excess of portfolio volatility over the risk limit
    #[serde(default = "default_feasibility_tolerance")]
    pub feasibility_tolerance: f64,
    #[serde(default = "default_trading_days")]
    pub trading_days: u32,
    #[serde(default)]
    pub non_convergence: ConvergencePolicy,
    #[serde(default)]
    pub verbose: bool,
}

fn default_max_iter() -> u32 {
    200
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_feasibility_tolerance() -> f64 {
    1e-6
}

fn default_trading_days() -> u32 {
    252
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            tol_gap_abs: default_tolerance(),
            tol_gap_rel: default_tolerance(),
            tol_feas: default_tolerance(),
            time_limit_secs: None,
            feasibility_tolerance: default_feasibility_tolerance(),
            trading_days: default_trading_days(),
            non_convergence: ConvergencePolicy::Warn,
            verbose: false,
        }
    }
}

/// Web UI settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
