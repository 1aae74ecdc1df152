//! Browserbase remote sessions over its HTTP API.

use super::{CaptureError, RemoteSession, SessionProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.browserbase.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    id: String,
    connect_url: String,
}

/// Creates sessions with `POST {api}/v1/sessions`.
#[derive(Clone)]
pub struct BrowserbaseProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    project_id: String,
}

impl BrowserbaseProvider {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            project_id: project_id.into(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SessionProvider for BrowserbaseProvider {
    async fn create_session(&self) -> Result<RemoteSession, CaptureError> {
        let url = format!("{}/v1/sessions", self.api_url);
        let resp = self
            .client
            .post(&url)
            .header("X-BB-API-Key", &self.api_key)
            .json(&serde_json::json!({ "projectId": self.project_id }))
            .send()
            .await
            .map_err(|e| CaptureError::Session(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CaptureError::Session(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let session: SessionResponse = resp
            .json()
            .await
            .map_err(|e| CaptureError::Session(format!("invalid session response: {e}")))?;

        Ok(RemoteSession {
            replay_url: Some(format!("https://browserbase.com/sessions/{}", session.id)),
            id: session.id,
            connect_url: session.connect_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .and(header("X-BB-API-Key", "bb-key"))
            .and(body_json(serde_json::json!({"projectId": "proj-1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "sess-42",
                "connectUrl": "wss://connect.browserbase.test/?sessionId=sess-42",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = BrowserbaseProvider::new("bb-key", "proj-1").with_api_url(server.uri());
        let session = provider.create_session().await.unwrap();
        assert_eq!(session.id, "sess-42");
        assert!(session.connect_url.starts_with("wss://"));
        assert_eq!(session.replay_url.as_deref(), Some("https://browserbase.com/sessions/sess-42"));
    }

    #[tokio::test]
    async fn test_rejected_session_is_session_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = BrowserbaseProvider::new("bad", "proj-1").with_api_url(server.uri());
        let err = provider.create_session().await.unwrap_err();
        match err {
            CaptureError::Session(msg) => assert_eq!(msg, "HTTP 401: invalid api key"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
