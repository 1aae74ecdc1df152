//! v0 chats API client.

use super::{AgentError, AgentFile, AgentReply, CodeAgent, VirtualFile};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.v0.dev/v1";

/// Generation agent backed by v0 chats.
///
/// `open_session` initialises a chat from files; every message is sent
/// synchronously and the chat's resulting files are returned.
#[derive(Clone)]
pub struct V0Agent {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl V0Agent {
    pub fn new(api_key: impl Into<String>) -> Self {
        // Generation round trips routinely take minutes.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, AgentError> {
        let url = format!("{}{path}", self.api_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[async_trait]
impl CodeAgent for V0Agent {
    async fn open_session(&self, files: &[VirtualFile]) -> Result<String, AgentError> {
        let body = json!({ "type": "files", "files": files });
        let chat = self.post("/chats/init", &body).await?;
        chat.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AgentError::InvalidResponse("chat has no id".into()))
    }

    async fn send(&self, session_id: &str, message: &str) -> Result<AgentReply, AgentError> {
        let chat = self
            .post(&format!("/chats/{session_id}/messages"), &json!({ "message": message }))
            .await?;
        let files = extract_files(&chat);
        debug!(chat_id = session_id, files = files.len(), "v0 reply");
        Ok(AgentReply { files })
    }
}

/// Read reply files from either the top-level `files` list or the latest
/// version's file list.
fn extract_files(chat: &Value) -> Vec<AgentFile> {
    let list = chat
        .get("files")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .or_else(|| {
            chat.pointer("/latestVersion/files")
                .and_then(Value::as_array)
        });
    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|f| {
            let path = f
                .pointer("/meta/file")
                .and_then(Value::as_str)
                .or_else(|| f.get("name").and_then(Value::as_str))?;
            let source = f
                .get("source")
                .and_then(Value::as_str)
                .or_else(|| f.get("content").and_then(Value::as_str))?;
            Some(AgentFile {
                path: path.to_string(),
                source: source.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_files_from_either_shape() {
        let legacy = json!({
            "files": [
                {"lang": "js", "meta": {"file": "scripts/get-data.js"}, "source": "v1"}
            ]
        });
        assert_eq!(extract_files(&legacy)[0].path, "scripts/get-data.js");
        assert_eq!(extract_files(&legacy)[0].source, "v1");

        let versioned = json!({
            "files": [],
            "latestVersion": {"files": [{"name": "scripts/get-data.js", "content": "v2"}]}
        });
        assert_eq!(extract_files(&versioned)[0].source, "v2");

        assert!(extract_files(&json!({"id": "c"})).is_empty());
    }

    #[tokio::test]
    async fn test_init_and_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chats/init"))
            .and(header("authorization", "Bearer v0-key"))
            .and(body_partial_json(json!({"type": "files"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "chat-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chats/chat-1/messages"))
            .and(body_partial_json(json!({"message": "do it"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chat-1",
                "files": [{"meta": {"file": "scripts/get-data.js"}, "source": "export async function getData() { return [1]; }"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let agent = V0Agent::new("v0-key").with_api_url(server.uri());
        let id = agent
            .open_session(&[VirtualFile::locked("package.json", "{}")])
            .await
            .unwrap();
        assert_eq!(id, "chat-1");

        let reply = agent.send(&id, "do it").await.unwrap();
        assert!(reply.file("scripts/get-data.js").is_some());
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let agent = V0Agent::new("k").with_api_url(server.uri());
        let err = agent.open_session(&[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Api { status: 429, .. }));
    }
}
