//! Test executor: evaluates one candidate in isolation and reports a verdict.
//!
//! Executors never fail. Every fault (bad schema text, unparsable example
//! arguments, a crashing candidate, an unreachable remote endpoint) becomes a
//! [`TestReport`] with `passed = false`, which the loop classifies as
//! [`Verdict::FailError`].

mod process;
mod remote;

pub use process::ProcessTestExecutor;
pub use remote::RemoteTestExecutor;

use crate::types::{SchemaSpec, Verdict};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Run-test request, in the executor's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRequest {
    #[serde(flatten)]
    pub spec: SchemaSpec,
    /// Candidate source text.
    pub script: String,
}

impl TestRequest {
    pub fn new(spec: &SchemaSpec, script: impl Into<String>) -> Self {
        Self {
            spec: spec.clone(),
            script: script.into(),
        }
    }
}

/// Structured outcome of one test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Captured console output followed by the result, or the error text.
    pub test_result: String,
    /// Output matched the schema and was not empty.
    pub passed: bool,
    /// The candidate returned an empty array.
    #[serde(default)]
    pub returned_empty: bool,
    #[serde(default)]
    pub validation_error: Option<String>,
}

impl TestReport {
    /// Report for a run that never produced a result.
    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            test_result: message.into(),
            passed: false,
            returned_empty: false,
            validation_error: None,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.passed && !self.returned_empty {
            Verdict::Pass
        } else if self.returned_empty && self.validation_error.is_none() {
            Verdict::FailEmpty
        } else {
            Verdict::FailError
        }
    }
}

/// Evaluates candidates against a [`SchemaSpec`].
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn run(&self, request: &TestRequest) -> TestReport;
}

/// Compose the `testResult` text from captured logs and a tail line.
pub(crate) fn compose_result(logs: &[String], tail: &str) -> String {
    if logs.is_empty() {
        tail.to_string()
    } else {
        format!("Console output:\n{}\n\n{tail}", logs.join("\n"))
    }
}
