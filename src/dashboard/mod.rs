//! Single-screen web UI
//!
//! `GET /` shows the input form with the last result, `POST /optimize` runs the
//! pipeline from the form, `POST /api/optimize` does the same for JSON clients.


use crate::client::PriceSource;
use crate::config::Config;
use crate::error::{PortfolioError, Result};
use crate::pipeline;
use crate::portfolio::AllocationReport;
use crate::render::{render_page, FormValues};
use crate::types::{parse_tickers, LookbackPeriod, RunConfig};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Dashboard state shared across handlers
pub struct DashboardState {
    pub source: Arc<dyn PriceSource>,
    pub config: Config,
    /// Form values as last entered
    pub last_form: RwLock<RunConfig>,
    pub last_report: RwLock<Option<AllocationReport>>,
}

impl DashboardState {
    pub fn new(source: Arc<dyn PriceSource>, config: Config) -> Self {
        let defaults = config.defaults.clone();
        Self {
            source,
            config,
            last_form: RwLock::new(defaults),
            last_report: RwLock::new(None),
        }
    }

    /// Remember the form and run it
    async fn submit(&self, run: RunConfig) -> Result<AllocationReport> {
        *self.last_form.write() = run.clone();
        let outcome = pipeline::run(self.source.as_ref(), &run, &self.config).await;
        *self.last_report.write() = outcome.as_ref().ok().cloned();
        outcome
    }
}

/// Raw fields of the HTML form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptimizeForm {
    #[serde(default)]
    pub tickers: String,
    #[serde(default)]
    pub total_investment: String,
    #[serde(default)]
    pub risk_tolerance: String,
    #[serde(default)]
    pub lookback: String,
}

impl OptimizeForm {
    /// Parse the fields, falling back to `defaults` for blank ones. Range
    /// checks are left to the pipeline.
    pub fn into_run_config(self, defaults: &RunConfig) -> Result<RunConfig> {
        let total_investment = parse_decimal(&self.total_investment, "total investment")?
            .unwrap_or(defaults.total_investment);
        let risk_tolerance = parse_decimal(&self.risk_tolerance, "risk tolerance")?
            .unwrap_or(defaults.risk_tolerance);
        let lookback = if self.lookback.trim().is_empty() {
            defaults.lookback
        } else {
            LookbackPeriod::from_str(&self.lookback)?
        };

        Ok(RunConfig {
            tickers: parse_tickers(&self.tickers),
            total_investment,
            risk_tolerance,
            lookback,
        })
    }
}

impl From<&OptimizeForm> for FormValues {
    fn from(form: &OptimizeForm) -> Self {
        Self {
            tickers: form.tickers.clone(),
            total_investment: form.total_investment.clone(),
            risk_tolerance: form.risk_tolerance.clone(),
            lookback: form.lookback.clone(),
        }
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<Option<Decimal>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .map(Some)
        .map_err(|_| PortfolioError::InvalidInput(format!("{} '{}' is not a number", field, raw)))
}

/// HTTP status for a failed run
pub fn status_for(error: &PortfolioError) -> StatusCode {
    match error {
        PortfolioError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
        PortfolioError::TransientFetch { .. } | PortfolioError::Http(_) => StatusCode::BAD_GATEWAY,
        PortfolioError::InvalidInput(_)
        | PortfolioError::InsufficientData { .. }
        | PortfolioError::InfeasibleConstraints { .. }
        | PortfolioError::OptimizationDidNotConverge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error body of the JSON API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============ HTTP API Handlers ============

/// Form with the last result
async fn index(State(state): State<Arc<DashboardState>>) -> Html<String> {
    let form = FormValues::from(&*state.last_form.read());
    let report = state.last_report.read().clone();
    Html(render_page(&form, report.as_ref(), None))
}

/// Run from the HTML form
async fn optimize_form(
    State(state): State<Arc<DashboardState>>,
    Form(form): Form<OptimizeForm>,
) -> (StatusCode, Html<String>) {
    let defaults = state.last_form.read().clone();
    let entered = FormValues::from(&form);
    let run = match form.into_run_config(&defaults) {
        Ok(run) => run,
        Err(e) => {
            return (
                status_for(&e),
                Html(render_page(&entered, None, Some(&e.to_string()))),
            );
        }
    };

    let shown = FormValues::from(&run);
    match state.submit(run).await {
        Ok(report) => (StatusCode::OK, Html(render_page(&shown, Some(&report), None))),
        Err(e) => {
            tracing::warn!("Run failed: {}", e);
            (status_for(&e), Html(render_page(&shown, None, Some(&e.to_string()))))
        }
    }
}

/// Run from a JSON body shaped like `RunConfig`
async fn optimize_json(
    State(state): State<Arc<DashboardState>>,
    Json(mut run): Json<RunConfig>,
) -> Response {
    run.tickers = parse_tickers(&run.tickers.join(","));
    match state.submit(run).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::warn!("API run failed: {}", e);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Create dashboard router
pub fn create_router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/optimize", post(optimize_form))
        .route("/api/optimize", post(optimize_json))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Start dashboard server
pub async fn start_dashboard(state: Arc<DashboardState>, host: &str, port: u16) -> Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("Dashboard server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
