//! Tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::PortfolioError;
    use crate::portfolio::SolveStatus;

    #[test]
    fn test_data_unavailable_message() {
        let err = PortfolioError::DataUnavailable {
            ticker: "ZZZZ".to_string(),
            reason: "No data found, symbol may be delisted".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ZZZZ"));
        assert!(msg.contains("delisted"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_fetch_is_transient() {
        let err = PortfolioError::TransientFetch {
            ticker: "AAPL".to_string(),
            reason: "HTTP 503".to_string(),
        };
        assert!(err.is_transient());
        assert!(!err.is_optimization_failure());
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = PortfolioError::InsufficientData { required: 2, actual: 1 };
        assert_eq!(
            err.to_string(),
            "Insufficient data: need at least 2 observations, got 1"
        );
    }

    #[test]
    fn test_optimization_failures() {
        let infeasible = PortfolioError::InfeasibleConstraints { risk_limit: 0.05 };
        assert!(infeasible.is_optimization_failure());
        assert!(infeasible.to_string().contains("0.0500"));

        let stalled = PortfolioError::OptimizationDidNotConverge {
            iterations: 200,
            status: SolveStatus::IterationLimit,
        };
        assert!(stalled.is_optimization_failure());
        assert!(stalled.to_string().contains("200"));
        assert!(stalled.to_string().contains("iteration limit"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: PortfolioError = parse.unwrap_err().into();
        assert!(matches!(err, PortfolioError::Json(_)));
    }
}
