//! Capture session controller.
//!
//! Opens a remote browser session, attaches to its page, records every
//! response observed during a fixed dwell window after navigation, and
//! returns the filtered, normalized responses as a [`Transcript`].
//!
//! The browser is reached through three seams: a [`SessionProvider`] that
//! creates sessions, a [`PageConnector`] that attaches to one, and the
//! [`CapturePage`] it hands back.

pub mod browserbase;
pub mod chromium;

use crate::normalize::normalize_text;
use crate::traffic::{BodyPolicy, Candidate, Decision, ResourceKind, TrafficFilter};
use crate::types::{Body, NetworkEvent, Transcript};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default collection window after navigation returns.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(10);

/// How long body reads may run past the end of the dwell window.
pub const BODY_READ_GRACE: Duration = Duration::from_secs(2);

/// Errors that abort a capture.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// The provider could not create a remote session.
    #[error("failed to create session: {0}")]
    Session(String),

    /// The controller could not attach to the session.
    #[error("failed to connect to session: {0}")]
    Connection(String),

    /// A single response body could not be read. Never aborts a capture.
    #[error("failed to read response body: {0}")]
    BodyRead(String),

    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// A remote browser session ready to be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub id: String,
    /// CDP websocket URL.
    pub connect_url: String,
    /// Where a recording of the session can be watched, if the provider has one.
    pub replay_url: Option<String>,
}

/// A response as reported by the page, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub resource_type: ResourceKind,
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub content_type: Option<String>,
}

impl ObservedResponse {
    fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                    .map(|(_, v)| v.as_str())
            })
            .unwrap_or("")
    }
}

/// Creates remote browser sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(&self) -> Result<RemoteSession, CaptureError>;

    /// Free whatever the provider holds for a session once the capture is over.
    async fn release(&self, _session: &RemoteSession) {}
}

/// Attaches to a session and yields its page.
#[async_trait]
pub trait PageConnector: Send + Sync {
    async fn connect(&self, session: &RemoteSession) -> Result<Box<dyn CapturePage>, CaptureError>;
}

/// One attached page.
#[async_trait]
pub trait CapturePage: Send + Sync {
    /// Start observing responses. Must be called before `navigate`.
    async fn observe(&mut self) -> Result<mpsc::UnboundedReceiver<ObservedResponse>, CaptureError>;
    /// Navigate to `url`, returning once the navigation settles.
    async fn navigate(&mut self, url: &str) -> Result<(), CaptureError>;
    /// Read the body of an observed response as text.
    async fn read_body(&self, request_id: &str) -> Result<String, CaptureError>;
    /// Close the page and disconnect.
    async fn close(self: Box<Self>);
}

/// Drives one capture: session, connect, observe, navigate, dwell, close.
pub struct CaptureController {
    provider: Arc<dyn SessionProvider>,
    connector: Arc<dyn PageConnector>,
    filter: TrafficFilter,
}

impl CaptureController {
    pub fn new(provider: Arc<dyn SessionProvider>, connector: Arc<dyn PageConnector>) -> Self {
        Self {
            provider,
            connector,
            filter: TrafficFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: TrafficFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Capture the traffic of one page visit.
    ///
    /// Only session creation and attachment can fail. A failed navigation is
    /// logged and the dwell window still runs, so whatever the page managed
    /// to load is kept. Body reads share one deadline, `dwell` plus
    /// [`BODY_READ_GRACE`]; a read still pending then leaves its event
    /// metadata-only.
    pub async fn capture(&self, url: &str, dwell: Duration) -> Result<Transcript, CaptureError> {
        let session = self.provider.create_session().await?;
        info!(
            session_id = %session.id,
            replay_url = session.replay_url.as_deref().unwrap_or("-"),
            "Session created"
        );

        let result = self.record(&session, url, dwell).await;
        self.provider.release(&session).await;
        let events = result?;
        info!(url, events = events.len(), session_id = %session.id, "Capture complete");

        let mut transcript = Transcript::new(url, events);
        transcript.replay_id = Some(session.id);
        Ok(transcript)
    }

    async fn record(
        &self,
        session: &RemoteSession,
        url: &str,
        dwell: Duration,
    ) -> Result<Vec<NetworkEvent>, CaptureError> {
        let mut page = self.connector.connect(session).await?;
        let mut responses = match page.observe().await {
            Ok(rx) => rx,
            Err(e) => {
                page.close().await;
                return Err(e);
            }
        };

        if let Err(e) = page.navigate(url).await {
            warn!(url, error = %e, "Navigation failed, continuing to collect traffic");
        }

        let deadline = tokio::time::Instant::now() + dwell;
        let reads_until = deadline + BODY_READ_GRACE;
        let mut events = Vec::new();
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                next = responses.recv() => match next {
                    Some(resp) => self.offer(page.as_ref(), resp, reads_until, &mut events).await,
                    None => {
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                },
            }
        }
        // Responses observed inside the window but not yet handled.
        while let Ok(resp) = responses.try_recv() {
            self.offer(page.as_ref(), resp, reads_until, &mut events).await;
        }

        page.close().await;
        Ok(events)
    }

    async fn offer(
        &self,
        page: &dyn CapturePage,
        resp: ObservedResponse,
        reads_until: tokio::time::Instant,
        events: &mut Vec<NetworkEvent>,
    ) {
        let candidate = Candidate {
            method: &resp.method,
            resource_type: resp.resource_type,
            url: &resp.url,
            content_type: resp.content_type(),
        };
        let policy = match self.filter.decide(&candidate) {
            Decision::Keep(policy) => policy,
            Decision::Drop(reason) => {
                debug!(url = %resp.url, ?reason, "Dropped response");
                return;
            }
        };

        let body = match policy {
            BodyPolicy::MetadataOnly => None,
            BodyPolicy::Json | BodyPolicy::Text => {
                match tokio::time::timeout_at(reads_until, page.read_body(&resp.request_id)).await {
                    Ok(Ok(text)) => Some(decode_body(policy, text)),
                    Ok(Err(e)) => {
                        debug!(url = %resp.url, error = %e, "Body unavailable");
                        None
                    }
                    Err(_) => {
                        debug!(url = %resp.url, "Body read timed out");
                        None
                    }
                }
            }
        };
        debug!(url = %resp.url, has_body = body.is_some(), "Kept response");

        events.push(NetworkEvent {
            url: resp.url,
            method: resp.method,
            resource_type: resp.resource_type.as_str().to_string(),
            status: resp.status,
            headers: (!resp.headers.is_empty()).then_some(resp.headers),
            body,
            captured_at_millis: chrono::Utc::now().timestamp_millis(),
        });
    }
}

/// JSON bodies become structured when they parse; everything else is
/// normalized text.
fn decode_body(policy: BodyPolicy, text: String) -> Body {
    if policy == BodyPolicy::Json {
        if let Ok(value) = serde_json::from_str(&text) {
            return Body::Json(value);
        }
    }
    Body::Text(normalize_text(&text))
}
