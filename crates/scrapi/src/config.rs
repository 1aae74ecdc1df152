//! Settings resolved from the environment, overridable by flags.

use anyhow::{bail, Result};
use clap::Args;
use scrapi_core::agent::{CodeAgent, V0Agent};
use scrapi_core::capture::browserbase::{self, BrowserbaseProvider};
use scrapi_core::capture::chromium::LocalChromiumProvider;
use scrapi_core::capture::SessionProvider;
use scrapi_core::executor::{ProcessTestExecutor, RemoteTestExecutor, TestExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Collaborator configuration shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Browserbase API key
    #[arg(long, env = "BROWSERBASE_API_KEY", global = true, hide_env_values = true)]
    pub browserbase_api_key: Option<String>,

    /// Browserbase project id
    #[arg(long, env = "BROWSERBASE_PROJECT_ID", global = true)]
    pub browserbase_project_id: Option<String>,

    /// Browserbase API base URL
    #[arg(long, env = "BROWSERBASE_API_URL", global = true, default_value = browserbase::DEFAULT_API_URL)]
    pub browserbase_api_url: String,

    /// v0 API key
    #[arg(long, env = "V0_API_KEY", global = true, hide_env_values = true)]
    pub v0_api_key: Option<String>,

    /// v0 API base URL
    #[arg(long, env = "V0_API_URL", global = true, default_value = scrapi_core::agent::V0_API_URL)]
    pub v0_api_url: String,

    /// Remote run-test endpoint; tests run locally when unset
    #[arg(long, env = "SCRAPI_EXECUTOR_URL", global = true)]
    pub executor_url: Option<String>,

    /// JavaScript runtime for local test runs
    #[arg(long, env = "SCRAPI_JS_RUNTIME", global = true, default_value = "node")]
    pub js_runtime: String,

    /// Chromium executable for --local captures
    #[arg(long, env = "SCRAPI_CHROMIUM_PATH", global = true)]
    pub chromium_path: Option<PathBuf>,

    /// Seconds to keep collecting traffic after navigation
    #[arg(long = "dwell", env = "SCRAPI_DWELL_SECS", global = true, default_value_t = 10)]
    pub dwell_secs: u64,
}

impl Settings {
    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_secs)
    }

    /// Browserbase when `local` is false, otherwise a local headless Chromium.
    pub fn session_provider(&self, local: bool) -> Result<Arc<dyn SessionProvider>> {
        if local {
            let mut provider = LocalChromiumProvider::new();
            if let Some(path) = &self.chromium_path {
                provider = provider.with_executable(path.clone());
            }
            return Ok(Arc::new(provider));
        }

        let (Some(key), Some(project)) = (&self.browserbase_api_key, &self.browserbase_project_id)
        else {
            bail!(
                "Browserbase is not configured: set {} (or pass --local to use a local Chromium)",
                self.missing_browserbase().join(" and ")
            );
        };
        Ok(Arc::new(
            BrowserbaseProvider::new(key, project).with_api_url(&self.browserbase_api_url),
        ))
    }

    pub fn agent(&self) -> Result<Arc<dyn CodeAgent>> {
        let Some(key) = &self.v0_api_key else {
            bail!("V0_API_KEY is not set");
        };
        Ok(Arc::new(V0Agent::new(key).with_api_url(&self.v0_api_url)))
    }

    pub fn executor(&self) -> Arc<dyn TestExecutor> {
        match &self.executor_url {
            Some(url) => Arc::new(RemoteTestExecutor::new(url)),
            None => Arc::new(ProcessTestExecutor::new(&self.js_runtime)),
        }
    }

    pub fn missing_browserbase(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.browserbase_api_key.is_none() {
            missing.push("BROWSERBASE_API_KEY");
        }
        if self.browserbase_project_id.is_none() {
            missing.push("BROWSERBASE_PROJECT_ID");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["scrapi"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).settings
    }

    #[test]
    fn test_flags_resolve_collaborators() {
        let s = parse(&[
            "--browserbase-api-key",
            "bb",
            "--browserbase-project-id",
            "p",
            "--v0-api-key",
            "v0",
            "--dwell",
            "3",
        ]);
        assert_eq!(s.dwell(), Duration::from_secs(3));
        assert!(s.session_provider(false).is_ok());
        assert!(s.agent().is_ok());
        assert!(s.missing_browserbase().is_empty());
    }

    #[test]
    fn test_local_capture_needs_no_keys() {
        let mut s = parse(&[]);
        s.browserbase_api_key = None;
        s.browserbase_project_id = None;
        assert!(s.session_provider(true).is_ok());

        let err = s.session_provider(false).err().unwrap().to_string();
        assert!(err.contains("BROWSERBASE_API_KEY and BROWSERBASE_PROJECT_ID"));
    }

    #[test]
    fn test_missing_agent_key_is_reported() {
        let mut s = parse(&[]);
        s.v0_api_key = None;
        assert_eq!(s.agent().err().unwrap().to_string(), "V0_API_KEY is not set");
    }
}
