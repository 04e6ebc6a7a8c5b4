//! Analysis worker integration -- invoke the external worker and interpret its output.
//!
//! The worker is an opaque process: it takes `<scenario> <seed>` as its last
//! two arguments, prints one JSON document on stdout and exits zero on
//! success. Everything about how it clusters errors is its own business.

pub mod interpret;
pub mod invoker;

use std::time::Duration;

use thiserror::Error;

use crate::incident::{Cluster, TrendPoint};

pub use self::interpret::interpret;
pub use self::invoker::{AnalysisRunner, ProcessRunner, RawOutput, Seed};

/// Failures while running the worker process.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to launch analysis worker `{program}`: {message}")]
    LaunchFailed { program: String, message: String },

    #[error("analysis worker failed with exit status {}", display_status(.status))]
    ExecutionFailed {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("analysis worker did not finish within {}s", .after.as_secs())]
    TimedOut { after: Duration },
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Failures while decoding the worker's stdout.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("analysis output is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("analysis output is not a JSON object")]
    NotAnObject,

    #[error("analysis output field `{field}` has an unexpected shape: {message}")]
    Field { field: &'static str, message: String },
}

/// Normalized worker output.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub service: String,
    /// Which strategy the worker ran, e.g. `sklearn` or `fallback`.
    pub engine: String,
    pub trend: Vec<TrendPoint>,
    pub clusters: Vec<Cluster>,
}
