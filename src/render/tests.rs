//! Tests for report rendering

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::portfolio::{AllocationReport, AllocationResult, PortfolioSummary, SolveStatus};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row(ticker: &str, weight: f64) -> AllocationResult {
        let capital = dec!(1000000);
        let w = Decimal::try_from(weight).unwrap();
        AllocationResult {
            ticker: ticker.to_string(),
            weight,
            allocation_pct: (w * dec!(100)).round_dp(2),
            capital_amount: (w * capital).round_dp(2),
            expected_return_amount: (w * capital * dec!(0.1)).round_dp(2),
            expected_risk_amount: (w * capital * dec!(0.2)).round_dp(2),
        }
    }

    fn report(rows: Vec<AllocationResult>) -> AllocationReport {
        AllocationReport {
            run_id: None,
            rows,
            summary: PortfolioSummary {
                expected_return_amount: dec!(100000),
                expected_return: 0.1,
                volatility: 0.14,
                risk_amount: dec!(140000),
                effective_n: 1.6,
                diversification_ratio: 1.2,
            },
            status: SolveStatus::Optimal,
            converged: true,
            iterations: 9,
            warnings: Vec::new(),
            total_investment: dec!(1000000),
            risk_tolerance: 0.15,
            observations: 1256,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 3),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
        }
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(dec!(0)), "$0.00");
        assert_eq!(format_money(dec!(999.5)), "$999.50");
        assert_eq!(format_money(dec!(1000)), "$1,000.00");
        assert_eq!(format_money(dec!(5000000)), "$5,000,000.00");
        assert_eq!(format_money(dec!(1234567.891)), "$1,234,567.89");
        assert_eq!(format_money(dec!(-25000.5)), "-$25,000.50");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"A&B\"</b>"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
        assert_eq!(escape_html("BRK-B"), "BRK-B");
    }

    #[test]
    fn test_render_table() {
        let text = render_table(&report(vec![row("AAPL", 0.25), row("MSFT", 0.75)]));
        assert!(text.contains("Ticker"));
        assert!(text.contains("Expected Risk"));
        assert!(text.contains("AAPL"));
        assert!(text.contains("25.00%"));
        assert!(text.contains("$750,000.00"));
        assert!(text.contains("2020-01-03 to 2024-12-31"));
        assert!(text.contains("optimal after 9 iterations"));
        assert!(!text.contains("WARNING"));
    }

    #[test]
    fn test_render_table_shows_warnings() {
        let mut r = report(vec![row("AAPL", 1.0)]);
        r.warnings.push("stopped early".to_string());
        assert!(render_table(&r).contains("WARNING: stopped early"));
    }

    #[test]
    fn test_render_bars_proportional() {
        let text = render_bars(&report(vec![row("AAPL", 0.25), row("VYM", 0.75)]), 40);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('█').count(), 10);
        assert_eq!(lines[1].matches('█').count(), 30);
        assert!(lines[1].starts_with("VYM "));
        assert!(lines[1].ends_with("75.00%"));
    }

    #[test]
    fn test_pie_svg_slices() {
        let svg = pie_svg(&report(vec![row("A", 0.5), row("B", 0.3), row("C", 0.2), row("D", 0.0)]), 200);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<path").count(), 3);
        assert!(!svg.contains("D: "));
    }

    #[test]
    fn test_pie_svg_single_holding_is_circle() {
        let svg = pie_svg(&report(vec![row("SPY", 1.0), row("VYM", 0.0)]), 200);
        assert_eq!(svg.matches("<circle").count(), 1);
        assert_eq!(svg.matches("<path").count(), 0);
    }

    #[test]
    fn test_render_page_with_result() {
        let form = FormValues::from(&RunConfig::default());
        let page = render_page(&form, Some(&report(vec![row("AAPL", 0.4), row("MSFT", 0.6)])), None);
        assert!(page.contains(r#"value="AAPL,MSFT,VYM""#));
        assert!(page.contains(r#"<option value="5y" selected>"#));
        assert!(page.contains("<table>"));
        assert!(page.contains("<svg"));
        assert!(!page.contains(r#"class="error""#));
    }

    #[test]
    fn test_render_page_with_error() {
        let form = FormValues::from(&RunConfig::default());
        let page = render_page(&form, None, Some("No price data available for <ZZZZ>"));
        assert!(page.contains("&lt;ZZZZ&gt;"));
        assert!(page.contains(r#"class="error""#));
        assert!(!page.contains("<table>"));
    }

    #[test]
    fn test_render_page_empty() {
        let page = render_page(&FormValues::from(&RunConfig::default()), None, None);
        assert!(page.contains("press Optimize"));
    }

    #[test]
    fn test_render_page_echoes_raw_values() {
        let form = FormValues {
            tickers: "AAPL, \"MSFT".to_string(),
            total_investment: "lots".to_string(),
            risk_tolerance: "0.2".to_string(),
            lookback: "10y".to_string(),
        };
        let page = render_page(&form, None, Some("total investment 'lots' is not a number"));
        assert!(page.contains(r#"value="AAPL, &quot;MSFT""#));
        assert!(page.contains(r#"value="lots""#));
        assert!(page.contains(r#"<option value="10y" selected>"#));
        assert!(!page.contains(r#"<option value="5y" selected>"#));
    }
}
