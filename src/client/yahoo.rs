//! Yahoo Finance chart API client
//!
//! Fetches daily closing prices for the supported lookback windows.

use super::PriceSource;
use crate::config::DataConfig;
use crate::error::{PortfolioError, Result};
use crate::types::{LookbackPeriod, PricePoint, PriceSeries};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Yahoo Finance client for daily closes
#[derive(Clone)]
pub struct YahooClient {
    http: Client,
    base_url: String,
    use_adjusted_close: bool,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl YahooClient {
    /// Create a new Yahoo client
    pub fn new(config: &DataConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            use_adjusted_close: config.use_adjusted_close,
        })
    }

    fn build_url(&self, ticker: &str) -> String {
        format!("{}/{}", self.base_url, ticker)
    }

    /// Turn a chart response body into a price series
    fn parse_response(&self, ticker: &str, status: StatusCode, body: &str) -> Result<PriceSeries> {
        let response: ChartResponse = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(_) if status.is_client_error() => {
                return Err(PortfolioError::DataUnavailable {
                    ticker: ticker.to_string(),
                    reason: format!("HTTP {}", status),
                });
            }
            Err(e) => {
                return Err(PortfolioError::TransientFetch {
                    ticker: ticker.to_string(),
                    reason: format!("undecodable response: {}", e),
                });
            }
        };

        if let Some(error) = response.chart.error {
            return Err(PortfolioError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: format!("{}: {}", error.code, error.description),
            });
        }

        let data = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| PortfolioError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "empty chart result".into(),
            })?;

        let offset = data.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
        let closes = data
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or(&[]);
        let adjusted = if self.use_adjusted_close {
            data.indicators
                .adjclose
                .as_ref()
                .and_then(|a| a.first())
                .map(|a| a.adjclose.as_slice())
        } else {
            None
        };

        let mut points = Vec::with_capacity(data.timestamp.len());
        for (i, &ts) in data.timestamp.iter().enumerate() {
            let close = adjusted
                .and_then(|a| a.get(i).copied().flatten())
                .or_else(|| closes.get(i).copied().flatten());

            let Some(close) = close.filter(|c| c.is_finite()) else {
                continue;
            };
            let Some(moment) = DateTime::from_timestamp(ts + offset, 0) else {
                debug!("{}: skipping out-of-range timestamp {}", ticker, ts);
                continue;
            };

            points.push(PricePoint {
                date: moment.date_naive(),
                close,
            });
        }

        if points.is_empty() {
            return Err(PortfolioError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "no closing prices in requested window".into(),
            });
        }

        Ok(PriceSeries::new(ticker, points))
    }
}

#[async_trait]
impl PriceSource for YahooClient {
    async fn fetch(&self, ticker: &str, period: LookbackPeriod) -> Result<PriceSeries> {
        let url = self.build_url(ticker);
        debug!("GET {} range={}", url, period);

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("range", period.as_str()),
                ("interval", "1d"),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await
            .map_err(|e| PortfolioError::TransientFetch {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(PortfolioError::TransientFetch {
                ticker: ticker.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = resp.text().await.map_err(|e| PortfolioError::TransientFetch {
            ticker: ticker.to_string(),
            reason: e.to_string(),
        })?;

        self.parse_response(ticker, status, &body)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

// Private parsing helpers are tested here
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn client(use_adjusted_close: bool) -> YahooClient {
        let config = DataConfig {
            use_adjusted_close,
            ..DataConfig::default()
        };
        YahooClient::new(&config).unwrap()
    }

    const VALID: &str = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL","gmtoffset":-18000},"timestamp":[1704205800,1704292200,1704378600],"indicators":{"quote":[{"open":[187.1,184.2,182.1],"close":[185.6,184.2,181.9],"volume":[82488700,58414500,71983600]}],"adjclose":[{"adjclose":[184.7,183.3,181.0]}]}}],"error":null}}"#;

    #[test]
    fn test_build_url() {
        let c = client(true);
        let url = c.build_url("BRK-B");
        assert!(url.ends_with("/BRK-B"));
        assert!(url.contains("finance.yahoo.com"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = DataConfig {
            base_url: "http://localhost:9999/chart/".to_string(),
            ..DataConfig::default()
        };
        let c = YahooClient::new(&config).unwrap();
        assert_eq!(c.build_url("AAPL"), "http://localhost:9999/chart/AAPL");
    }

    #[test]
    fn test_parse_response_prefers_adjusted_close() {
        let series = client(true).parse_response("AAPL", StatusCode::OK, VALID).unwrap();
        assert_eq!(series.ticker, "AAPL");
        assert_eq!(series.closes(), vec![184.7, 183.3, 181.0]);
    }

    #[test]
    fn test_parse_response_raw_close() {
        let series = client(false).parse_response("AAPL", StatusCode::OK, VALID).unwrap();
        assert_eq!(series.closes(), vec![185.6, 184.2, 181.9]);
    }

    #[test]
    fn test_parse_response_local_dates() {
        // 1704205800 is 2024-01-02 14:30 UTC, 09:30 in New York
        let series = client(true).parse_response("AAPL", StatusCode::OK, VALID).unwrap();
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 4));
    }

    #[test]
    fn test_parse_response_skips_nulls() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200,1704378600],"indicators":{"quote":[{"close":[185.6,null,181.9]}]}}],"error":null}}"#;
        let series = client(true).parse_response("AAPL", StatusCode::OK, json).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![185.6, 181.9]);
    }

    #[test]
    fn test_parse_response_adjusted_null_falls_back_to_close() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200],"indicators":{"quote":[{"close":[185.6,184.2]}],"adjclose":[{"adjclose":[184.7,null]}]}}],"error":null}}"#;
        let series = client(true).parse_response("AAPL", StatusCode::OK, json).unwrap();
        assert_eq!(series.closes(), vec![184.7, 184.2]);
    }

    #[test]
    fn test_parse_response_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let result = client(true).parse_response("ZZZZ", StatusCode::NOT_FOUND, json);
        match result {
            Err(PortfolioError::DataUnavailable { ticker, reason }) => {
                assert_eq!(ticker, "ZZZZ");
                assert!(reason.contains("Not Found"));
            }
            other => panic!("Expected DataUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_empty_result() {
        let json = r#"{"chart":{"result":[],"error":null}}"#;
        let result = client(true).parse_response("AAPL", StatusCode::OK, json);
        assert!(matches!(result, Err(PortfolioError::DataUnavailable { .. })));
    }

    #[test]
    fn test_parse_response_no_timestamps() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let result = client(true).parse_response("NEWIPO", StatusCode::OK, json);
        assert!(matches!(result, Err(PortfolioError::DataUnavailable { .. })));
    }

    #[test]
    fn test_parse_response_garbage_is_transient() {
        let result = client(true).parse_response("AAPL", StatusCode::OK, "<html>oops</html>");
        assert!(matches!(result, Err(PortfolioError::TransientFetch { .. })));
    }

    #[test]
    fn test_parse_response_garbage_404_is_unavailable() {
        let result = client(true).parse_response("AAPL", StatusCode::NOT_FOUND, "Not Found");
        assert!(matches!(result, Err(PortfolioError::DataUnavailable { .. })));
    }

    /// Serve `body` with `status` for every ticker; returns the base URL
    async fn stub_server(status: StatusCode, body: &'static str) -> String {
        let app = axum::Router::new().route(
            "/chart/{ticker}",
            axum::routing::get(move || async move { (status, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/chart", addr)
    }

    fn client_for(base_url: String) -> YahooClient {
        let config = DataConfig {
            base_url,
            timeout_secs: 5,
            ..DataConfig::default()
        };
        YahooClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let base = stub_server(StatusCode::OK, VALID).await;
        let series = client_for(base)
            .fetch("AAPL", LookbackPeriod::FiveYears)
            .await
            .unwrap();
        assert_eq!(series.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_rate_limited_is_transient() {
        let base = stub_server(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").await;
        let result = client_for(base).fetch("AAPL", LookbackPeriod::FiveYears).await;
        match result {
            Err(PortfolioError::TransientFetch { ticker, reason }) => {
                assert_eq!(ticker, "AAPL");
                assert!(reason.contains("429"));
            }
            other => panic!("Expected TransientFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_transient() {
        let base = stub_server(StatusCode::SERVICE_UNAVAILABLE, "down").await;
        let result = client_for(base).fetch("AAPL", LookbackPeriod::ThreeYears).await;
        assert!(matches!(result, Err(PortfolioError::TransientFetch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let base = stub_server(StatusCode::NOT_FOUND, body).await;
        let result = client_for(base).fetch("ZZZZ", LookbackPeriod::FiveYears).await;
        assert!(matches!(result, Err(PortfolioError::DataUnavailable { .. })));

        let base = stub_server(StatusCode::NOT_FOUND, "Not Found").await;
        let result = client_for(base).fetch("ZZZZ", LookbackPeriod::FiveYears).await;
        assert!(matches!(result, Err(PortfolioError::DataUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client_for(format!("http://{}/chart", addr))
            .fetch("AAPL", LookbackPeriod::FiveYears)
            .await;
        assert!(matches!(result, Err(PortfolioError::TransientFetch { .. })));
    }
}
