//! Market-data clients
//!
//! A [`PriceSource`] returns daily closes for one ticker. [`fetch_all`] drives a
//! source over the whole asset set with all-or-nothing semantics.

pub mod yahoo;


pub use yahoo::YahooClient;

use crate::error::{PortfolioError, Result};
use crate::types::{LookbackPeriod, PriceSeries};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};

/// Source of historical daily closing prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the daily closes of `ticker` over `period`, oldest first
    async fn fetch(&self, ticker: &str, period: LookbackPeriod) -> Result<PriceSeries>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Fetch every ticker, keeping at most `max_concurrency` requests in flight.
///
/// Results come back in the order of `tickers` regardless of completion order.
/// The first failure aborts the whole set.
pub async fn fetch_all(
    source: &dyn PriceSource,
    tickers: &[String],
    period: LookbackPeriod,
    max_concurrency: usize,
) -> Result<Vec<PriceSeries>> {
    if max_concurrency == 0 {
        return Err(PortfolioError::InvalidInput(
            "max_concurrency must be at least 1".into(),
        ));
    }

    tracing::info!(
        "Fetching {} tickers from {} ({}, concurrency {})",
        tickers.len(),
        source.name(),
        period,
        max_concurrency
    );

    // Collected first: a borrowing map closure on the stream leaves the future !Send
    let pending: Vec<_> = tickers
        .iter()
        .map(|ticker| fetch_one(source, ticker.as_str(), period))
        .collect();
    let series: Vec<PriceSeries> = stream::iter(pending)
        .buffered(max_concurrency)
        .try_collect()
        .await?;

    Ok(series)
}

async fn fetch_one(
    source: &dyn PriceSource,
    ticker: &str,
    period: LookbackPeriod,
) -> Result<PriceSeries> {
    let trimmed = ticker.trim();
    if trimmed.is_empty() || trimmed != ticker {
        return Err(PortfolioError::InvalidInput(format!(
            "ticker '{}' must be non-empty and trimmed",
            ticker
        )));
    }

    let series = source.fetch(ticker, period).await?;
    if series.is_empty() {
        return Err(PortfolioError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: "provider returned no closing prices".into(),
        });
    }

    tracing::debug!(
        "{}: {} closes from {:?} to {:?}",
        ticker,
        series.len(),
        series.first_date(),
        series.last_date()
    );
    Ok(series)
}
