//! Core types shared across the pipeline

use crate::error::{PortfolioError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Minimum capital accepted for a run
pub const MIN_INVESTMENT: Decimal = dec!(100000);
/// Lowest accepted risk tolerance (annualized standard deviation)
pub const MIN_RISK_TOLERANCE: Decimal = dec!(0.05);
/// Highest accepted risk tolerance (annualized standard deviation)
pub const MAX_RISK_TOLERANCE: Decimal = dec!(0.5);

/// Historical window over which daily closes are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LookbackPeriod {
    #[serde(rename = "3y")]
    ThreeYears,
    #[default]
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
}

impl LookbackPeriod {
    pub const ALL: [LookbackPeriod; 3] = [Self::ThreeYears, Self::FiveYears, Self::TenYears];

    /// Range token understood by the market-data provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeYears => "3y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
        }
    }

    pub fn years(&self) -> u32 {
        match self {
            Self::ThreeYears => 3,
            Self::FiveYears => 5,
            Self::TenYears => 10,
        }
    }
}

impl fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookbackPeriod {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "3y" | "3" => Ok(Self::ThreeYears),
            "5y" | "5" => Ok(Self::FiveYears),
            "10y" | "10" => Ok(Self::TenYears),
            other => Err(PortfolioError::InvalidInput(format!(
                "unsupported lookback period '{}' (expected 3y, 5y or 10y)",
                other
            ))),
        }
    }
}

/// One daily closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Chronologically ordered closing prices for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting by date and keeping the last close for duplicate dates
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self {
            ticker: ticker.into(),
            points: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}

/// Split the raw comma-separated ticker field into unique trimmed symbols
pub fn parse_tickers(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Immutable inputs of one optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub tickers: Vec<String>,
    pub total_investment: Decimal,
    pub risk_tolerance: Decimal,
    pub lookback: LookbackPeriod,
}

impl RunConfig {
    /// Build and validate a run configuration
    pub fn new(
        tickers: Vec<String>,
        total_investment: Decimal,
        risk_tolerance: Decimal,
        lookback: LookbackPeriod,
    ) -> Result<Self> {
        let config = Self {
            tickers,
            total_investment,
            risk_tolerance,
            lookback,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the input constraints of the run form
    pub fn validate(&self) -> Result<()> {
        if self.tickers.is_empty() {
            return Err(PortfolioError::InvalidInput(
                "at least one ticker is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for ticker in &self.tickers {
            if ticker.is_empty() || ticker.trim() != ticker {
                return Err(PortfolioError::InvalidInput(format!(
                    "ticker '{}' must be non-empty and trimmed",
                    ticker
                )));
            }
            if !seen.insert(ticker.as_str()) {
                return Err(PortfolioError::InvalidInput(format!(
                    "ticker '{}' appears more than once",
                    ticker
                )));
            }
        }

        if self.total_investment < MIN_INVESTMENT {
            return Err(PortfolioError::InvalidInput(format!(
                "total investment {} is below the minimum of {}",
                self.total_investment, MIN_INVESTMENT
            )));
        }

        if self.risk_tolerance < MIN_RISK_TOLERANCE || self.risk_tolerance > MAX_RISK_TOLERANCE {
            return Err(PortfolioError::InvalidInput(format!(
                "risk tolerance {} must be within [{}, {}]",
                self.risk_tolerance, MIN_RISK_TOLERANCE, MAX_RISK_TOLERANCE
            )));
        }

        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tickers: vec!["AAPL".to_string(), "MSFT".to_string(), "VYM".to_string()],
            total_investment: dec!(5000000),
            risk_tolerance: dec!(0.15),
            lookback: LookbackPeriod::FiveYears,
        }
    }
}
