//! Mapping of pipeline failures onto HTTP responses.
//!
//! Every failure carries enough detail in the body to triage it without
//! digging through server logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::analysis::InvocationError;
use crate::simulate::SimulationError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid request body: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Simulation(SimulationError::Invocation(inv)) => invocation_body(inv),
            ApiError::Simulation(SimulationError::Interpret(e)) => json!({
                "error": e.to_string(),
                "kind": "parse_error",
            }),
            ApiError::Simulation(SimulationError::Store(e)) | ApiError::Store(e) => json!({
                "error": e.to_string(),
                "kind": "store_unavailable",
            }),
            ApiError::BadRequest(_) => json!({
                "error": self.to_string(),
                "kind": "bad_request",
            }),
        }
    }
}

fn invocation_body(err: &InvocationError) -> Value {
    match err {
        InvocationError::LaunchFailed { program, .. } => json!({
            "error": err.to_string(),
            "kind": "launch_failed",
            "program": program,
        }),
        InvocationError::ExecutionFailed {
            status,
            stdout,
            stderr,
        } => json!({
            "error": "analysis worker failed",
            "kind": "execution_failed",
            "status": status,
            "stdout": stdout,
            "stderr": stderr,
        }),
        InvocationError::TimedOut { after } => json!({
            "error": err.to_string(),
            "kind": "timed_out",
            "timeoutSecs": after.as_secs(),
        }),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_execution_failure_body_keeps_streams() {
        let err = ApiError::from(SimulationError::from(InvocationError::ExecutionFailed {
            status: Some(1),
            stdout: "{".into(),
            stderr: "ModuleNotFoundError: No module named 'sklearn'".into(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.body();
        assert_eq!(body["kind"], "execution_failed");
        assert_eq!(body["status"], 1);
        assert_eq!(body["stdout"], "{");
        assert_eq!(body["stderr"], "ModuleNotFoundError: No module named 'sklearn'");
    }

    #[test]
    fn test_timeout_body() {
        let err = ApiError::from(SimulationError::from(InvocationError::TimedOut {
            after: Duration::from_secs(30),
        }));
        assert_eq!(err.body()["timeoutSecs"], 30);
    }

    #[test]
    fn test_bad_request_status() {
        let err = ApiError::BadRequest("expected value at line 1 column 1".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body()["kind"], "bad_request");
    }
}
