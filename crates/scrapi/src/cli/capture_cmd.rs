//! `scrapi capture`

use super::print_json;
use crate::config::Settings;
use anyhow::{bail, Context, Result};
use scrapi_core::capture::chromium::ChromiumConnector;
use scrapi_core::capture::CaptureController;
use scrapi_core::Transcript;
use std::path::Path;
use std::sync::Arc;

pub async fn run(settings: &Settings, url: &str, local: bool, out: &Path, json: bool) -> Result<()> {
    let transcript = capture(settings, url, local).await?;
    transcript
        .write_json(out)
        .with_context(|| format!("failed to write transcript to {}", out.display()))?;

    if json {
        print_json(&serde_json::json!({
            "url": transcript.url,
            "events": transcript.len(),
            "replayId": transcript.replay_id,
            "out": out.display().to_string(),
        }));
    } else {
        println!("Captured {} responses from {}", transcript.len(), transcript.url);
        if let Some(id) = &transcript.replay_id {
            println!("  Session: {id}");
        }
        println!("  Transcript: {}", out.display());
    }
    Ok(())
}

/// Capture one page with the configured provider.
pub(crate) async fn capture(settings: &Settings, url: &str, local: bool) -> Result<Transcript> {
    check_url(url)?;
    let provider = settings.session_provider(local)?;
    let controller = CaptureController::new(provider, Arc::new(ChromiumConnector));
    controller
        .capture(url, settings.dwell())
        .await
        .with_context(|| format!("failed to capture {url}"))
}

fn check_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported URL scheme '{}': expected http or https", parsed.scheme());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_absolute_http_urls() {
        assert!(check_url("https://lu.ma/abc").is_ok());
        assert!(check_url("http://localhost:3000/").is_ok());
        assert!(check_url("/relative/path").is_err());
        assert!(check_url("file:///etc/passwd").is_err());
    }
}
