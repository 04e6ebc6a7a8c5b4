//! Typed decode of the worker's JSON output with explicit per-field defaults.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{AnalysisResult, InterpretError};

/// Service recorded when the worker does not name one.
pub const DEFAULT_SERVICE: &str = "payments-api";

/// Engine recorded when the worker does not report one.
pub const UNKNOWN_ENGINE: &str = "unknown";

/// Parse the worker's stdout into an [`AnalysisResult`].
///
/// Absent or `null` fields take their defaults (`service` also defaults when
/// empty). A field that is present but has the wrong shape is a
/// [`InterpretError::Field`]. Unrecognised keys are ignored.
pub fn interpret(stdout: &str) -> Result<AnalysisResult, InterpretError> {
    let value: Value = serde_json::from_str(stdout)?;
    let Value::Object(mut doc) = value else {
        return Err(InterpretError::NotAnObject);
    };

    let service = optional_string(doc.remove("service"), "service")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVICE.to_string());
    let engine =
        optional_string(doc.remove("engine"), "engine")?.unwrap_or_else(|| UNKNOWN_ENGINE.to_string());
    let trend = list(doc.remove("trend"), "trend")?;
    let clusters = list(doc.remove("clusters"), "clusters")?;

    Ok(AnalysisResult {
        service,
        engine,
        trend,
        clusters,
    })
}

fn optional_string(value: Option<Value>, field: &'static str) -> Result<Option<String>, InterpretError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(InterpretError::Field {
            field,
            message: format!("expected a string, found {}", kind(&other)),
        }),
    }
}

fn list<T: DeserializeOwned>(value: Option<Value>, field: &'static str) -> Result<Vec<T>, InterpretError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v @ Value::Array(_)) => serde_json::from_value(v).map_err(|e| InterpretError::Field {
            field,
            message: e.to_string(),
        }),
        Some(other) => Err(InterpretError::Field {
            field,
            message: format!("expected an array, found {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
