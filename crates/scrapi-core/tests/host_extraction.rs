//! End-to-end: capture one JSON XHR, then synthesize an extractor for it.

use async_trait::async_trait;
use regex::Regex;
use scrapi_core::agent::ScriptedAgent;
use scrapi_core::capture::{
    CaptureController, CaptureError, CapturePage, ObservedResponse, PageConnector, RemoteSession,
    SessionProvider, DEFAULT_DWELL,
};
use scrapi_core::executor::{TestExecutor, TestReport, TestRequest};
use scrapi_core::schema;
use scrapi_core::synth::files::CANDIDATE_PATH;
use scrapi_core::synth::prompt::EMPTY_RESULT_REJECTION;
use scrapi_core::synth::{SynthesisLoop, MAX_ATTEMPTS};
use scrapi_core::traffic::ResourceKind;
use scrapi_core::{Body, SchemaSpec, Transcript, Verdict};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

const HOSTS_BODY: &str = r#"{"hosts":[{"name":"Ada","picture_url":"http://x/a.png"}]}"#;

struct OneSession;

#[async_trait]
impl SessionProvider for OneSession {
    async fn create_session(&self) -> Result<RemoteSession, CaptureError> {
        Ok(RemoteSession {
            id: "sess-hosts".into(),
            connect_url: "ws://fake".into(),
            replay_url: None,
        })
    }
}

struct HostsPage {
    tx: Option<mpsc::UnboundedSender<ObservedResponse>>,
}

#[async_trait]
impl CapturePage for HostsPage {
    async fn observe(&mut self) -> Result<mpsc::UnboundedReceiver<ObservedResponse>, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn navigate(&mut self, _url: &str) -> Result<(), CaptureError> {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ObservedResponse {
                request_id: "r1".into(),
                url: "https://events.test/api/event/evt-1".into(),
                method: "GET".into(),
                resource_type: ResourceKind::Xhr,
                status: Some(200),
                headers: BTreeMap::new(),
                content_type: Some("application/json".into()),
            });
        }
        Ok(())
    }

    async fn read_body(&self, _request_id: &str) -> Result<String, CaptureError> {
        Ok(HOSTS_BODY.to_string())
    }

    async fn close(self: Box<Self>) {}
}

struct HostsConnector;

#[async_trait]
impl PageConnector for HostsConnector {
    async fn connect(&self, _: &RemoteSession) -> Result<Box<dyn CapturePage>, CaptureError> {
        Ok(Box::new(HostsPage { tx: None }))
    }
}

/// Evaluates candidates of the form `return data.a.b ?? []` against the
/// captured JSON body, then validates like a real executor would.
struct PathExecutor {
    data: Value,
}

#[async_trait]
impl TestExecutor for PathExecutor {
    async fn run(&self, request: &TestRequest) -> TestReport {
        let re = Regex::new(r"return data((?:\.\w+)+)").unwrap();
        let Some(path) = re.captures(&request.script).map(|c| c[1].to_string()) else {
            return TestReport::fault("Error: getData did not return a value");
        };

        let mut cursor = Some(&self.data);
        for key in path.split('.').filter(|k| !k.is_empty()) {
            cursor = cursor.and_then(|v| v.get(key));
        }
        let result = cursor.cloned().unwrap_or_else(|| json!([]));

        let output = schema::parse(&request.spec.output_schema).unwrap();
        let validation_error = output.validate(&result).err().map(|e| e.to_string());
        let returned_empty = result.as_array().is_some_and(|a| a.is_empty());
        TestReport {
            test_result: format!("Console output:\nkeys: {path}\n\nResult: {result}"),
            passed: validation_error.is_none() && !returned_empty,
            returned_empty,
            validation_error,
        }
    }
}

fn spec() -> SchemaSpec {
    SchemaSpec {
        input_schema: "{event_id: string}".into(),
        output_schema: "array<{name: string, picture_url?: string}>".into(),
        example_args: "{ event_id: \"evt-1\" }".into(),
    }
}

fn candidate(path: &str) -> String {
    format!("export async function getData(input) {{\n  const data = await load(input);\n  return data{path} ?? [];\n}}\n")
}

async fn captured() -> Transcript {
    let ctl = CaptureController::new(Arc::new(OneSession), Arc::new(HostsConnector));
    ctl.capture("https://events.test/e/evt-1", DEFAULT_DWELL).await.unwrap()
}

fn executor_for(transcript: &Transcript) -> Arc<PathExecutor> {
    let data = match &transcript.events[0].body {
        Some(Body::Json(v)) => v.clone(),
        other => panic!("expected a JSON body, got {other:?}"),
    };
    Arc::new(PathExecutor { data })
}

#[tokio::test(start_paused = true)]
async fn test_capture_keeps_the_json_xhr() {
    let transcript = captured().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript.events[0].resource_type, "xhr");
    assert_eq!(transcript.replay_id.as_deref(), Some("sess-hosts"));
}

#[tokio::test(start_paused = true)]
async fn test_correct_candidate_passes_first_time() {
    let transcript = captured().await;
    let exec = executor_for(&transcript);
    let agent = Arc::new(ScriptedAgent::new().reply_with(CANDIDATE_PATH, &candidate(".hosts")));

    let outcome = SynthesisLoop::new(agent.clone(), exec)
        .run(transcript, "Get the event hosts", &spec())
        .await;

    assert!(outcome.result.test_passed);
    assert_eq!(outcome.result.attempts_used, 1);
    assert_eq!(outcome.attempts[0].verdict, Verdict::Pass);
    assert_eq!(agent.messages().len(), 1);

    let opened = agent.opened_sessions();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0][0].name, "logs/log-0.json");
    assert!(opened[0][0].content.contains("picture_url"));
}

#[tokio::test(start_paused = true)]
async fn test_wrong_sibling_gets_one_correction() {
    let transcript = captured().await;
    let exec = executor_for(&transcript);
    let agent = Arc::new(
        ScriptedAgent::new()
            .reply_with(CANDIDATE_PATH, &candidate(".event.hosts"))
            .reply_with(CANDIDATE_PATH, &candidate(".hosts")),
    );

    let outcome = SynthesisLoop::new(agent.clone(), exec)
        .run(transcript, "Get the event hosts", &spec())
        .await;

    let verdicts: Vec<Verdict> = outcome.attempts.iter().map(|a| a.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::FailEmpty, Verdict::Pass]);
    assert!(outcome.result.test_passed);

    let messages = agent.messages();
    assert_eq!(messages.len(), 2);
    let corrections: Vec<&String> = messages
        .iter()
        .filter(|m| m.contains(EMPTY_RESULT_REJECTION))
        .collect();
    assert_eq!(corrections.len(), 1);
    assert!(corrections[0].contains("Result: []"));
}

#[tokio::test(start_paused = true)]
async fn test_always_wrong_exhausts_budget() {
    let transcript = captured().await;
    let exec = executor_for(&transcript);
    let mut agent = ScriptedAgent::new();
    for _ in 0..MAX_ATTEMPTS {
        agent = agent.reply_with(CANDIDATE_PATH, &candidate(".event.hosts"));
    }
    let agent = Arc::new(agent);

    let outcome = SynthesisLoop::new(agent.clone(), exec)
        .run(transcript, "Get the event hosts", &spec())
        .await;

    assert!(!outcome.result.test_passed);
    assert_eq!(outcome.result.attempts_used, MAX_ATTEMPTS);
    assert_eq!(outcome.result.final_candidate_source, candidate(".event.hosts"));
    assert_eq!(outcome.result.generation_session_id.as_deref(), Some("scripted-1"));
}

#[tokio::test(start_paused = true)]
async fn test_candidate_without_result_is_error_not_empty() {
    let transcript = captured().await;
    let exec = executor_for(&transcript);
    let agent = Arc::new(
        ScriptedAgent::new()
            .reply_with(CANDIDATE_PATH, "export async function getData() { return {}; }")
            .reply_with(CANDIDATE_PATH, &candidate(".hosts")),
    );

    let outcome = SynthesisLoop::new(agent.clone(), exec)
        .run(transcript, "Get the event hosts", &spec())
        .await;

    assert_eq!(outcome.attempts[0].verdict, Verdict::FailError);
    assert!(outcome.result.test_passed);
    assert!(!agent.messages()[1].contains(EMPTY_RESULT_REJECTION));
}
