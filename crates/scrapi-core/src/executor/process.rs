//! Local executor: runs the candidate in a JS runtime subprocess.
//!
//! The candidate is rewritten into a CommonJS module, loaded by a small
//! harness that captures console output, and its result is printed as one
//! marker-prefixed JSON line on stdout. Schema checks happen on this side.

use super::{compose_result, TestExecutor, TestReport, TestRequest};
use crate::schema::{self, SchemaType};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Prefix of the harness's result line.
const RESULT_MARKER: &str = "__SCRAPI_RESULT__";

/// Default wall-clock limit for one candidate run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const HARNESS: &str = r#"const MARKER = "__SCRAPI_RESULT__";
const logs = [];
const fmt = (a) => (a !== null && typeof a === "object" ? JSON.stringify(a) : String(a));
const capture = (...args) => { logs.push(args.map(fmt).join(" ")); };
console.log = capture;
console.info = capture;
console.warn = capture;
console.error = capture;
const emit = (payload) => process.stdout.write(MARKER + JSON.stringify(payload) + "\n");
(async () => {
  try {
    const args = JSON.parse(require("fs").readFileSync(__dirname + "/args.json", "utf8"));
    const { getData } = require("./candidate.cjs");
    if (typeof getData !== "function") throw new Error("getData is not defined");
    const result = await getData(args);
    emit({ ok: true, logs, result: result === undefined ? null : result });
  } catch (e) {
    emit({ ok: false, logs, error: e && e.stack ? String(e.stack) : String(e) });
  }
})();
"#;

#[derive(Debug, Deserialize)]
struct HarnessOutcome {
    ok: bool,
    #[serde(default)]
    logs: Vec<String>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Runs candidates locally with `node` (or another runtime) under a timeout.
#[derive(Debug, Clone)]
pub struct ProcessTestExecutor {
    runtime: String,
    timeout: Duration,
}

impl Default for ProcessTestExecutor {
    fn default() -> Self {
        Self::new("node")
    }
}

impl ProcessTestExecutor {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn execute(&self, request: &TestRequest) -> TestReport {
        let output_schema = match schema::parse(&request.spec.output_schema) {
            Ok(s) => s,
            Err(e) => return TestReport::fault(format!("Invalid output schema: {e}")),
        };
        let input_schema = if request.spec.input_schema.trim().is_empty() {
            None
        } else {
            match schema::parse(&request.spec.input_schema) {
                Ok(s) => Some(s),
                Err(e) => return TestReport::fault(format!("Invalid input schema: {e}")),
            }
        };

        let args = match parse_example_args(&request.spec.example_args) {
            Ok(v) => v,
            Err(e) => return TestReport::fault(format!("Invalid test arguments: {e}")),
        };
        if let Some(input) = &input_schema {
            if let Err(e) = input.validate(&args) {
                return TestReport::fault(format!("Test arguments do not match input schema: {e}"));
            }
        }

        let outcome = match self.spawn_harness(&request.script, &args).await {
            Ok(o) => o,
            Err(message) => return TestReport::fault(message),
        };

        judge(outcome, &output_schema)
    }

    async fn spawn_harness(&self, script: &str, args: &Value) -> Result<HarnessOutcome, String> {
        let dir = tempfile::Builder::new()
            .prefix("scrapi-test-")
            .tempdir()
            .map_err(|e| format!("Failed to create sandbox directory: {e}"))?;

        let write = |name: &str, contents: &str| {
            std::fs::write(dir.path().join(name), contents)
                .map_err(|e| format!("Failed to write {name}: {e}"))
        };
        write("candidate.cjs", &to_commonjs(script))?;
        write("harness.cjs", HARNESS)?;
        write("args.json", &args.to_string())?;

        let child = Command::new(&self.runtime)
            .arg("harness.cjs")
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start {}: {e}", self.runtime))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("Failed to run {}: {e}", self.runtime)),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Candidate timed out");
                return Err(format!("Test timed out after {} seconds", self.timeout.as_secs()));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(status = ?output.status, stdout_len = stdout.len(), "Harness exited");

        let line = stdout
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix(RESULT_MARKER));
        match line {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| format!("Malformed harness output: {e}")),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(format!(
                    "Candidate produced no result (exit status {}):\n{}",
                    output.status,
                    stderr.trim()
                ))
            }
        }
    }
}

#[async_trait]
impl TestExecutor for ProcessTestExecutor {
    async fn run(&self, request: &TestRequest) -> TestReport {
        self.execute(request).await
    }
}

/// Turn harness output into a report, validating the result.
fn judge(outcome: HarnessOutcome, output_schema: &SchemaType) -> TestReport {
    if !outcome.ok {
        let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
        return TestReport::fault(compose_result(&outcome.logs, &format!("Error: {error}")));
    }

    let pretty = serde_json::to_string_pretty(&outcome.result).unwrap_or_else(|_| outcome.result.to_string());
    let test_result = compose_result(&outcome.logs, &format!("Result: {pretty}"));
    let returned_empty = matches!(&outcome.result, Value::Array(a) if a.is_empty());
    let validation_error = output_schema.validate(&outcome.result).err().map(|e| e.to_string());

    TestReport {
        test_result,
        passed: validation_error.is_none() && !returned_empty,
        returned_empty,
        validation_error,
    }
}

/// Example arguments are a JS object literal; JSON5 covers the common forms.
pub(crate) fn parse_example_args(text: &str) -> Result<Value, json5::Error> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    json5::from_str(text)
}

fn import_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*import\s.*$").expect("valid regex"))
}

fn export_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(\s*)export\s+(default\s+)?(async\s+function|function|const|let|var)\b")
            .expect("valid regex")
    })
}

/// Strip ES module syntax and export `getData` the CommonJS way.
pub(crate) fn to_commonjs(script: &str) -> String {
    let without_imports = import_line_re().replace_all(script, "");
    let body = export_re().replace_all(&without_imports, "$1$3");
    format!(
        "{body}\n\nmodule.exports = {{ getData: typeof getData === \"function\" ? getData : undefined }};\n"
    )
}
