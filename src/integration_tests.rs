//! End-to-end tests: config → fetch → statistics → optimizer → rendering

#[cfg(test)]
mod tests {
    use crate::client::MockPriceSource;
    use crate::config::Config;
    use crate::error::PortfolioError;
    use crate::pipeline;
    use crate::render::{render_bars, render_table};
    use crate::types::{LookbackPeriod, PricePoint, PriceSeries, RunConfig};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const CONFIG_TOML: &str = r#"
[data]
max_concurrent_fetches = 2

[optimizer]
max_iter = 150
non_convergence = "fail"

[defaults]
tickers = ["SPY", "TLT", "GLD"]
total_investment = 3000000
risk_tolerance = 0.12
lookback = "3y"
"#;

    fn closes(ticker: &str, n: i64) -> PriceSeries {
        let (drift, amp, freq) = match ticker {
            "SPY" => (0.0007, 0.011, 0.8),
            "TLT" => (0.0001, 0.006, 1.9),
            "GLD" => (0.0004, 0.008, 2.7),
            _ => (0.0002, 0.005, 1.1),
        };
        let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let mut price = 100.0;
        let points = (0..n)
            .map(|i| {
                if i > 0 {
                    price *= 1.0 + drift + amp * (freq * i as f64).sin();
                }
                PricePoint {
                    date: start + chrono::Duration::days(i),
                    close: price,
                }
            })
            .collect();
        PriceSeries::new(ticker, points)
    }

    fn source(n: i64) -> MockPriceSource {
        let mut source = MockPriceSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_fetch()
            .withf(|_, period| *period == LookbackPeriod::ThreeYears)
            .returning(move |ticker, _| Ok(closes(ticker, n)));
        source
    }

    #[tokio::test]
    async fn test_configured_defaults_end_to_end() {
        let config: Config = toml::from_str(CONFIG_TOML).unwrap();
        config.validate().unwrap();
        assert_eq!(config.defaults.tickers, vec!["SPY", "TLT", "GLD"]);

        let report = pipeline::run(&source(400), &config.defaults, &config).await.unwrap();
        assert!(report.converged);
        assert_eq!(report.total_investment, dec!(3000000));
        assert!(report.summary.volatility <= 0.12 + 1e-6);

        let table = render_table(&report);
        for ticker in ["SPY", "TLT", "GLD"] {
            assert!(table.contains(ticker));
        }
        assert_eq!(render_bars(&report, 20).lines().count(), 3);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "optimal");
        assert_eq!(json["rows"].as_array().map(|r| r.len()), Some(3));
        assert!(json["run_id"].is_string());
    }

    #[tokio::test]
    async fn test_expected_return_grows_with_risk_tolerance() {
        let config: Config = toml::from_str(CONFIG_TOML).unwrap();
        let mut previous = None;
        for risk in [dec!(0.08), dec!(0.12), dec!(0.2)] {
            let run = RunConfig {
                risk_tolerance: risk,
                ..config.defaults.clone()
            };
            let report = pipeline::run(&source(400), &run, &config).await.unwrap();
            let amount = report.summary.expected_return_amount;
            if let Some(prev) = previous {
                assert!(amount >= prev - dec!(1), "{} < {} at risk {}", amount, prev, risk);
            }
            previous = Some(amount);
        }
    }

    #[tokio::test]
    async fn test_too_little_history() {
        let config: Config = toml::from_str(CONFIG_TOML).unwrap();
        let result = pipeline::run(&source(2), &config.defaults, &config).await;
        assert!(matches!(
            result,
            Err(PortfolioError::InsufficientData { required: 2, actual: 1 })
        ));
    }
}
