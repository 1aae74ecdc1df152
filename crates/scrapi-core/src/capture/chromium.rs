//! CDP page access via chromiumoxide, plus a local headless Chromium provider.

use super::{CaptureError, CapturePage, ObservedResponse, PageConnector, RemoteSession, SessionProvider};
use crate::traffic::ResourceKind;
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. SCRAPI_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("SCRAPI_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.scrapi/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".scrapi/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".scrapi/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else {
            vec![home.join(".scrapi/chromium/chrome-linux64/chrome")]
        };
        if let Some(c) = candidates.into_iter().find(|c| c.exists()) {
            return Some(c);
        }
    }

    // 3. System PATH
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Attaches to any CDP websocket endpoint.
#[derive(Debug, Default, Clone)]
pub struct ChromiumConnector;

#[async_trait]
impl PageConnector for ChromiumConnector {
    async fn connect(&self, session: &RemoteSession) -> Result<Box<dyn CapturePage>, CaptureError> {
        let (browser, mut handler) = Browser::connect(session.connect_url.as_str())
            .await
            .map_err(|e| CaptureError::Connection(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let existing = browser
            .pages()
            .await
            .map_err(|e| CaptureError::Connection(e.to_string()))?;
        let page = match existing.into_iter().next() {
            Some(p) => p,
            None => browser
                .new_page("about:blank")
                .await
                .map_err(|e| CaptureError::Connection(e.to_string()))?,
        };

        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler_task,
            observer_task: None,
        }))
    }
}

/// A page on a CDP-connected browser.
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    observer_task: Option<JoinHandle<()>>,
}

enum NetworkSignal {
    Request(Arc<EventRequestWillBeSent>),
    Response(Arc<EventResponseReceived>),
}

#[async_trait]
impl CapturePage for ChromiumPage {
    async fn observe(&mut self) -> Result<mpsc::UnboundedReceiver<ObservedResponse>, CaptureError> {
        let conn = |e: chromiumoxide::error::CdpError| CaptureError::Connection(e.to_string());

        self.page.execute(EnableParams::default()).await.map_err(conn)?;
        let requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(conn)?
            .map(NetworkSignal::Request);
        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(conn)?
            .map(NetworkSignal::Response);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut signals = futures::stream::select(requests, responses).boxed();
        self.observer_task = Some(tokio::spawn(async move {
            // Responses do not carry the request method.
            let mut methods: HashMap<String, String> = HashMap::new();
            while let Some(signal) = signals.next().await {
                match signal {
                    NetworkSignal::Request(ev) => {
                        methods.insert(ev.request_id.inner().clone(), ev.request.method.clone());
                    }
                    NetworkSignal::Response(ev) => {
                        let id = ev.request_id.inner().clone();
                        let method = methods.remove(&id).unwrap_or_else(|| "GET".to_string());
                        if tx.send(to_observed(&ev, id, method)).is_err() {
                            break;
                        }
                    }
                }
            }
        }));
        Ok(rx)
    }

    async fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| CaptureError::Navigation(e.to_string()))
    }

    async fn read_body(&self, request_id: &str) -> Result<String, CaptureError> {
        let params = GetResponseBodyParams::new(RequestId::new(request_id));
        let resp = self
            .page
            .execute(params)
            .await
            .map_err(|e| CaptureError::BodyRead(e.to_string()))?;
        if resp.result.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&resp.result.body)
                .map_err(|e| CaptureError::BodyRead(e.to_string()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(resp.result.body.clone())
        }
    }

    async fn close(self: Box<Self>) {
        let mut this = *self;
        if let Some(task) = this.observer_task.take() {
            task.abort();
        }
        let _ = this.page.close().await;
        let _ = this.browser.close().await;
        this.handler_task.abort();
        debug!("Page closed");
    }
}

fn to_observed(ev: &EventResponseReceived, request_id: String, method: String) -> ObservedResponse {
    let headers: BTreeMap<String, String> = ev
        .response
        .headers
        .inner()
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.to_ascii_lowercase(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    ObservedResponse {
        request_id,
        url: ev.response.url.clone(),
        method,
        resource_type: ResourceKind::parse(ev.r#type.as_ref()),
        status: u16::try_from(ev.response.status).ok(),
        headers,
        content_type: Some(ev.response.mime_type.clone()).filter(|m| !m.is_empty()),
    }
}

struct LaunchedBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Launches a local headless Chromium per session. The process lives until
/// the session is released.
pub struct LocalChromiumProvider {
    executable: Option<PathBuf>,
    launched: Mutex<HashMap<String, LaunchedBrowser>>,
    next_id: AtomicU64,
}

impl LocalChromiumProvider {
    pub fn new() -> Self {
        Self {
            executable: None,
            launched: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of browsers launched and not yet released.
    pub async fn running(&self) -> usize {
        self.launched.lock().await.len()
    }

    pub fn with_executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
}

impl Default for LocalChromiumProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for LocalChromiumProvider {
    async fn create_session(&self) -> Result<RemoteSession, CaptureError> {
        let chrome_path = self
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| CaptureError::Session("Chromium not found. Set SCRAPI_CHROMIUM_PATH.".into()))?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| CaptureError::Session(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CaptureError::Session(format!("failed to launch Chromium: {e}")))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let connect_url = browser.websocket_address().clone();
        let id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(session_id = %id, %connect_url, "Launched local Chromium");
        self.launched.lock().await.insert(
            id.clone(),
            LaunchedBrowser {
                browser,
                handler_task,
            },
        );

        Ok(RemoteSession {
            id,
            connect_url,
            replay_url: None,
        })
    }

    async fn release(&self, session: &RemoteSession) {
        let Some(mut launched) = self.launched.lock().await.remove(&session.id) else {
            return;
        };
        if let Err(e) = launched.browser.close().await {
            debug!(session_id = %session.id, error = %e, "Browser already gone");
        }
        let _ = launched.browser.wait().await;
        launched.handler_task.abort();
        info!(session_id = %session.id, "Local Chromium stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_executable_is_session_error() {
        let provider = LocalChromiumProvider::new().with_executable(PathBuf::from("/nonexistent/chrome"));
        let err = provider.create_session().await.unwrap_err();
        assert!(matches!(err, CaptureError::Session(_)));
    }

    #[tokio::test]
    async fn test_releasing_unknown_session_is_a_no_op() {
        let provider = LocalChromiumProvider::new();
        let session = RemoteSession {
            id: "local-99".into(),
            connect_url: "ws://127.0.0.1:1/devtools/browser/none".into(),
            replay_url: None,
        };
        provider.release(&session).await;
        provider.release(&session).await;
        assert_eq!(provider.running().await, 0);
    }

    #[test]
    fn test_wire_resource_types_map_to_kinds() {
        use chromiumoxide::cdp::browser_protocol::network::ResourceType;

        assert_eq!(ResourceKind::parse(ResourceType::Xhr.as_ref()), ResourceKind::Xhr);
        assert_eq!(ResourceKind::parse(ResourceType::Fetch.as_ref()), ResourceKind::Fetch);
        assert_eq!(ResourceKind::parse(ResourceType::Document.as_ref()), ResourceKind::Document);
        assert_eq!(ResourceKind::parse(ResourceType::Script.as_ref()), ResourceKind::Script);
    }

    #[tokio::test]
    async fn test_bad_endpoint_is_connection_error() {
        let session = RemoteSession {
            id: "x".into(),
            connect_url: "ws://127.0.0.1:1/devtools/browser/none".into(),
            replay_url: None,
        };
        let err = match ChromiumConnector.connect(&session).await {
            Ok(_) => panic!("connect should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, CaptureError::Connection(_)));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_local_capture_records_document() {
        use crate::capture::CaptureController;

        let ctl = CaptureController::new(Arc::new(LocalChromiumProvider::new()), Arc::new(ChromiumConnector));
        let t = ctl
            .capture("data:text/html,<h1>Hello</h1>", Duration::from_secs(1))
            .await
            .expect("capture failed");
        assert!(t.replay_id.is_some());
    }
}
