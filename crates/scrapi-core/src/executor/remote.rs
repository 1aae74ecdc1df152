//! Executor backed by a remote run-test endpoint.

use super::{TestExecutor, TestReport, TestRequest};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// POSTs the run-test contract to `endpoint` and reads back the report.
#[derive(Clone)]
pub struct RemoteTestExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteTestExecutor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn post(&self, request: &TestRequest) -> Result<TestReport, reqwest::Error> {
        self.client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<TestReport>()
            .await
    }
}

#[async_trait]
impl TestExecutor for RemoteTestExecutor {
    async fn run(&self, request: &TestRequest) -> TestReport {
        match self.post(request).await {
            Ok(report) => report,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Run-test request failed");
                TestReport::fault(format!("Test executor unavailable: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SchemaSpec, Verdict};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> SchemaSpec {
        SchemaSpec {
            input_schema: "{}".into(),
            output_schema: "array<any>".into(),
            example_args: "{}".into(),
        }
    }

    #[tokio::test]
    async fn test_posts_contract_and_reads_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/run-test"))
            .and(body_partial_json(serde_json::json!({
                "outputSchemaString": "array<any>",
                "script": "x"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "testResult": "Result: []",
                "passed": false,
                "returnedEmpty": true,
                "validationError": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let exec = RemoteTestExecutor::new(format!("{}/api/run-test", server.uri()));
        let report = exec.run(&TestRequest::new(&spec(), "x")).await;
        assert_eq!(report.verdict(), Verdict::FailEmpty);
        assert_eq!(report.test_result, "Result: []");
    }

    #[tokio::test]
    async fn test_http_failure_becomes_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let exec = RemoteTestExecutor::new(server.uri());
        let report = exec.run(&TestRequest::new(&spec(), "x")).await;
        assert_eq!(report.verdict(), Verdict::FailError);
        assert!(report.test_result.starts_with("Test executor unavailable"));
    }
}
