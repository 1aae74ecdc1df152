//! Core data types shared by capture and synthesis.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A captured response body.
///
/// JSON responses are kept structured; anything else with a textual content
/// type is kept as text. On deserialization a bare string is always `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Text(String),
    Json(serde_json::Value),
}

/// One response observed during a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    pub url: String,
    pub method: String,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    /// Wall-clock capture time in Unix milliseconds.
    #[serde(rename = "timestamp")]
    pub captured_at_millis: i64,
}

/// Ordered, filtered and normalized responses from one page visit.
///
/// Insertion order is observation order. Built once by the capture controller
/// and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub url: String,
    pub events: Vec<NetworkEvent>,
    /// Replay identifier of the remote session, for observability only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_id: Option<String>,
}

impl Transcript {
    pub fn new(url: impl Into<String>, events: Vec<NetworkEvent>) -> Self {
        Self {
            url: url.into(),
            events,
            replay_id: None,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Write the transcript as pretty JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load a transcript previously written with [`Transcript::write_json`].
    ///
    /// A bare JSON array of events is accepted too.
    pub fn read_json(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        if let Ok(t) = serde_json::from_str::<Transcript>(&raw) {
            return Ok(t);
        }
        let events: Vec<NetworkEvent> = serde_json::from_str(&raw)?;
        Ok(Transcript::new(String::new(), events))
    }
}

/// Declared input/output schemas plus one literal example input.
///
/// Opaque text to the synthesis loop; only the test executor interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSpec {
    #[serde(rename = "inputSchemaString")]
    pub input_schema: String,
    #[serde(rename = "outputSchemaString")]
    pub output_schema: String,
    #[serde(rename = "testArgsString")]
    pub example_args: String,
}

/// Classification of one candidate's test outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    FailError,
    FailEmpty,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::FailError => "fail_error",
            Verdict::FailEmpty => "fail_empty",
        };
        f.write_str(s)
    }
}

/// One iteration of the synthesis loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number.
    pub index: u32,
    pub candidate_source: String,
    pub verdict: Verdict,
    pub diagnostic_output: String,
}

/// Final outcome of one synthesis loop invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopResult {
    pub final_candidate_source: String,
    pub test_passed: bool,
    /// `None` only when the agent never accepted a session.
    pub generation_session_id: Option<String>,
    pub attempts_used: u32,
}
