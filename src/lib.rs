//! Risk-Constrained Portfolio Allocation
//!
//! Fetches daily closes for a set of tickers, estimates annualized return
//! statistics and finds the fully invested long-only allocation with the
//! highest expected return whose volatility stays under a limit.
//!
//! ## Architecture
//!
//! ```text
//! PriceSource (Yahoo) → Stats (returns, covariance) → Optimizer (Clarabel SOCP) → Projector
//!                                         ↑                                          ↓
//!                                     RunConfig                            Render (CLI / Web)
//! ```

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod pipeline;
pub mod portfolio;
pub mod render;
pub mod stats;
pub mod types;

#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod integration_tests;
