//! Presentation of allocation reports
//!
//! Terminal output (table + proportional bars) and the single-screen HTML page
//! with its SVG pie chart.

#[cfg(test)]
mod tests;

use crate::portfolio::AllocationReport;
use crate::types::{LookbackPeriod, RunConfig, MAX_RISK_TOLERANCE, MIN_INVESTMENT, MIN_RISK_TOLERANCE};
use prettytable::{format, row, Cell, Row, Table};
use rust_decimal::Decimal;
use std::f64::consts::PI;
use std::fmt::Write;

/// Slice colors, cycled
const PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f",
    "#edc948", "#b07aa1", "#ff9da7", "#9c755f", "#bab0ac",
];

/// Weights below this are left out of charts
const MIN_CHART_WEIGHT: f64 = 1e-4;

/// `$1,234,567.89`
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Allocation table plus portfolio summary for the terminal
pub fn render_table(report: &AllocationReport) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Ticker", "Allocation", "Amount", "Expected Return", "Expected Risk"]);
    for r in &report.rows {
        table.add_row(Row::new(vec![
            Cell::new(&r.ticker),
            Cell::new(&format!("{:.2}%", r.allocation_pct)).style_spec("r"),
            Cell::new(&format_money(r.capital_amount)).style_spec("r"),
            Cell::new(&format_money(r.expected_return_amount)).style_spec("r"),
            Cell::new(&format_money(r.expected_risk_amount)).style_spec("r"),
        ]));
    }

    let mut out = table.to_string();
    let s = &report.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Expected annual return: {} ({:.2}%)",
        format_money(s.expected_return_amount),
        s.expected_return * 100.0
    );
    let _ = writeln!(
        out,
        "Portfolio volatility:   {:.2}% (limit {:.2}%), {} at risk",
        s.volatility * 100.0,
        report.risk_tolerance * 100.0,
        format_money(s.risk_amount)
    );
    let _ = writeln!(
        out,
        "Effective assets:       {:.2}  Diversification ratio: {:.2}",
        s.effective_n, s.diversification_ratio
    );
    if let (Some(start), Some(end)) = (report.start_date, report.end_date) {
        let _ = writeln!(
            out,
            "Window:                 {} to {} ({} observations)",
            start, end, report.observations
        );
    }
    let _ = writeln!(
        out,
        "Solver:                 {} after {} iterations",
        report.status, report.iterations
    );
    for warning in &report.warnings {
        let _ = writeln!(out, "WARNING: {}", warning);
    }
    out
}

/// One bar per asset, length proportional to its weight
pub fn render_bars(report: &AllocationReport, width: usize) -> String {
    let label_width = report.rows.iter().map(|r| r.ticker.len()).max().unwrap_or(0);
    let mut out = String::new();
    for r in &report.rows {
        let filled = (r.weight.clamp(0.0, 1.0) * width as f64).round() as usize;
        let _ = writeln!(
            out,
            "{:<label$} {}{} {:>6}%",
            r.ticker,
            "█".repeat(filled),
            " ".repeat(width.saturating_sub(filled)),
            format!("{:.2}", r.allocation_pct),
            label = label_width
        );
    }
    out
}

/// Pie chart of the held weights as a standalone SVG element
pub fn pie_svg(report: &AllocationReport, size: u32) -> String {
    let radius = size as f64 / 2.0 - 4.0;
    let center = size as f64 / 2.0;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{0}" viewBox="0 0 {0} {0}" role="img">"#,
        size
    );

    let mut angle = -PI / 2.0;
    for (i, r) in report.rows.iter().enumerate() {
        if r.weight < MIN_CHART_WEIGHT {
            continue;
        }
        let color = PALETTE[i % PALETTE.len()];
        let title = format!("{}: {:.2}%", escape_html(&r.ticker), r.allocation_pct);

        if r.weight >= 1.0 - MIN_CHART_WEIGHT {
            let _ = write!(
                svg,
                r#"<circle cx="{c:.2}" cy="{c:.2}" r="{r:.2}" fill="{color}"><title>{title}</title></circle>"#,
                c = center,
                r = radius,
                color = color,
                title = title
            );
            break;
        }

        let sweep = r.weight.min(1.0) * 2.0 * PI;
        let (x0, y0) = (center + radius * angle.cos(), center + radius * angle.sin());
        angle += sweep;
        let (x1, y1) = (center + radius * angle.cos(), center + radius * angle.sin());
        let large_arc = if sweep > PI { 1 } else { 0 };
        let _ = write!(
            svg,
            r#"<path d="M {cx:.2} {cy:.2} L {x0:.2} {y0:.2} A {r:.2} {r:.2} 0 {large} 1 {x1:.2} {y1:.2} Z" fill="{color}"><title>{title}</title></path>"#,
            cx = center,
            cy = center,
            x0 = x0,
            y0 = y0,
            r = radius,
            large = large_arc,
            x1 = x1,
            y1 = y1,
            color = color,
            title = title
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Minimal escaping for text and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Input form contents as shown on the page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    pub tickers: String,
    pub total_investment: String,
    pub risk_tolerance: String,
    pub lookback: String,
}

impl From<&RunConfig> for FormValues {
    fn from(run: &RunConfig) -> Self {
        Self {
            tickers: run.tickers.join(","),
            total_investment: run.total_investment.to_string(),
            risk_tolerance: run.risk_tolerance.to_string(),
            lookback: run.lookback.as_str().to_string(),
        }
    }
}

/// The single-screen page: input form, then the result or the error
pub fn render_page(form: &FormValues, report: Option<&AllocationReport>, error: Option<&str>) -> String {
    let mut page = String::from(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Portfolio Optimizer</title>
<style>
body { font-family: sans-serif; display: flex; gap: 2rem; margin: 2rem; }
aside { min-width: 16rem; }
label { display: block; margin-top: 0.8rem; }
table { border-collapse: collapse; }
th, td { padding: 0.3rem 0.8rem; border-bottom: 1px solid #ddd; }
td.num { text-align: right; }
.error { color: #b00020; }
.warning { color: #8a6d00; }
.legend span { display: inline-block; width: 0.8rem; height: 0.8rem; margin-right: 0.3rem; }
</style>
</head>
<body>
"#,
    );

    render_form(&mut page, form);

    page.push_str("<main>\n<h1>Portfolio Optimizer</h1>\n");
    if let Some(message) = error {
        let _ = writeln!(page, r#"<p class="error">{}</p>"#, escape_html(message));
    }
    match report {
        Some(report) => render_result(&mut page, report),
        None if error.is_none() => {
            page.push_str("<p>Enter tickers and press Optimize.</p>\n");
        }
        None => {}
    }
    page.push_str("</main>\n</body>\n</html>\n");
    page
}

fn render_form(page: &mut String, form: &FormValues) {
    let _ = write!(
        page,
        r#"<aside>
<form method="post" action="/optimize">
<label>Tickers (comma separated)
<input type="text" name="tickers" value="{tickers}"></label>
<label>Total investment
<input type="number" name="total_investment" min="{min_inv}" step="100000" value="{investment}"></label>
<label>Risk tolerance
<input type="number" name="risk_tolerance" min="{min_risk}" max="{max_risk}" step="0.01" value="{risk}"></label>
<label>Historical data
<select name="lookback">
"#,
        tickers = escape_html(&form.tickers),
        min_inv = MIN_INVESTMENT,
        investment = escape_html(&form.total_investment),
        min_risk = MIN_RISK_TOLERANCE,
        max_risk = MAX_RISK_TOLERANCE,
        risk = escape_html(&form.risk_tolerance)
    );
    for period in LookbackPeriod::ALL {
        let _ = writeln!(
            page,
            r#"<option value="{0}"{1}>{2} years</option>"#,
            period.as_str(),
            if period.as_str() == form.lookback.trim() { " selected" } else { "" },
            period.years()
        );
    }
    page.push_str("</select></label>\n<p><button type=\"submit\">Optimize</button></p>\n</form>\n</aside>\n");
}

fn render_result(page: &mut String, report: &AllocationReport) {
    for warning in &report.warnings {
        let _ = writeln!(page, r#"<p class="warning">{}</p>"#, escape_html(warning));
    }

    page.push_str(
        "<table>\n<tr><th>Ticker</th><th>Optimal Allocation</th><th>Amount</th><th>Expected Return</th><th>Expected Risk</th></tr>\n",
    );
    for r in &report.rows {
        let _ = writeln!(
            page,
            r#"<tr><td>{}</td><td class="num">{:.2}%</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
            escape_html(&r.ticker),
            r.allocation_pct,
            format_money(r.capital_amount),
            format_money(r.expected_return_amount),
            format_money(r.expected_risk_amount)
        );
    }
    page.push_str("</table>\n");

    let s = &report.summary;
    let _ = writeln!(
        page,
        "<p>Expected annual return {} ({:.2}%), volatility {:.2}% against a limit of {:.2}%, {:.2} effective assets.</p>",
        format_money(s.expected_return_amount),
        s.expected_return * 100.0,
        s.volatility * 100.0,
        report.risk_tolerance * 100.0,
        s.effective_n
    );

    page.push_str("<h2>Allocation</h2>\n");
    page.push_str(&pie_svg(report, 280));
    page.push_str("\n<p class=\"legend\">");
    for (i, r) in report.rows.iter().enumerate() {
        if r.weight < MIN_CHART_WEIGHT {
            continue;
        }
        let _ = write!(
            page,
            r#"<span style="background:{}"></span>{} "#,
            PALETTE[i % PALETTE.len()],
            escape_html(&r.ticker)
        );
    }
    page.push_str("</p>\n");
}
