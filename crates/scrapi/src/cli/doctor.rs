//! Environment readiness check.

use super::print_json;
use crate::config::Settings;
use anyhow::Result;
use scrapi_core::capture::chromium::find_chromium;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

/// Inspect configuration and local tooling.
pub fn checks(settings: &Settings) -> Vec<Check> {
    let mut checks = Vec::new();

    let missing = settings.missing_browserbase();
    checks.push(if missing.is_empty() {
        Check::new("browserbase", true, format!("Browserbase configured ({})", settings.browserbase_api_url))
    } else {
        Check::new("browserbase", false, format!("{} not set", missing.join(", ")))
    });

    let chromium = settings.chromium_path.clone().filter(|p| p.exists()).or_else(find_chromium);
    checks.push(match chromium {
        Some(path) => Check::new("chromium", true, format!("Chromium found: {}", path.display())),
        None => Check::new("chromium", false, "Chromium NOT found; --local captures are unavailable"),
    });

    checks.push(match &settings.v0_api_key {
        Some(_) => Check::new("agent", true, format!("v0 configured ({})", settings.v0_api_url)),
        None => Check::new("agent", false, "V0_API_KEY not set"),
    });

    checks.push(match &settings.executor_url {
        Some(url) => Check::new("executor", true, format!("Remote executor: {url}")),
        None => match which::which(&settings.js_runtime) {
            Ok(path) => Check::new("executor", true, format!("Local runtime: {}", path.display())),
            Err(_) => Check::new(
                "executor",
                false,
                format!("{} not found and SCRAPI_EXECUTOR_URL not set", settings.js_runtime),
            ),
        },
    });

    checks
}

/// Ready to generate: a capture route, an agent and an executor.
pub fn is_ready(checks: &[Check]) -> bool {
    let ok = |name: &str| checks.iter().any(|c| c.name == name && c.ok);
    (ok("browserbase") || ok("chromium")) && ok("agent") && ok("executor")
}

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let checks = checks(settings);
    let ready = is_ready(&checks);

    if json {
        print_json(&serde_json::json!({ "ready": ready, "checks": checks }));
        return Ok(());
    }

    println!("scrapi doctor");
    println!("=============");
    println!();
    for check in &checks {
        let mark = if check.ok { "[OK]" } else { "[!!]" };
        println!("{mark} {}", check.detail);
    }
    println!();
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &'static str, ok: bool) -> Check {
        Check::new(name, ok, "")
    }

    #[test]
    fn test_ready_needs_one_capture_route() {
        let base = |bb: bool, chrome: bool| {
            vec![check("browserbase", bb), check("chromium", chrome), check("agent", true), check("executor", true)]
        };
        assert!(is_ready(&base(true, false)));
        assert!(is_ready(&base(false, true)));
        assert!(!is_ready(&base(false, false)));
    }

    #[test]
    fn test_missing_agent_is_not_ready() {
        let checks = vec![check("browserbase", true), check("agent", false), check("executor", true)];
        assert!(!is_ready(&checks));
    }
}
