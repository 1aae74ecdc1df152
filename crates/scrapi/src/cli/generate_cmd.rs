//! `scrapi generate` and `scrapi synthesize`

use super::{capture_cmd, print_json, TaskArgs};
use crate::config::Settings;
use anyhow::{Context, Result};
use scrapi_core::audit::AttemptTrail;
use scrapi_core::synth::{LoopOutcome, SynthesisLoop};
use scrapi_core::Transcript;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File the final candidate is written to inside the output directory.
pub const FUNCTION_FILE: &str = "get-data.js";
pub const REPORT_FILE: &str = "attempts.json";
pub const TRANSCRIPT_FILE: &str = "transcript.json";

pub async fn run_generate(
    settings: &Settings,
    url: &str,
    local: bool,
    task: &TaskArgs,
    json: bool,
) -> Result<()> {
    // Resolve everything the loop needs before spending a browser session.
    let spec = task.schema.to_spec()?;
    settings.agent()?;

    let transcript = capture_cmd::capture(settings, url, local).await?;
    let path = task.out_dir.join(TRANSCRIPT_FILE);
    transcript
        .write_json(&path)
        .with_context(|| format!("failed to write transcript to {}", path.display()))?;

    let outcome = synthesize(settings, transcript, task, &spec).await?;
    report(&outcome, task, json)
}

pub async fn run_synthesize(
    settings: &Settings,
    transcript: &Path,
    task: &TaskArgs,
    json: bool,
) -> Result<()> {
    let spec = task.schema.to_spec()?;
    let transcript = Transcript::read_json(transcript)
        .with_context(|| format!("failed to load transcript {}", transcript.display()))?;

    let outcome = synthesize(settings, transcript, task, &spec).await?;
    report(&outcome, task, json)
}

async fn synthesize(
    settings: &Settings,
    transcript: Transcript,
    task: &TaskArgs,
    spec: &scrapi_core::SchemaSpec,
) -> Result<LoopOutcome> {
    let mut synth = SynthesisLoop::new(settings.agent()?, settings.executor());
    if !task.no_trail {
        match AttemptTrail::default_trail() {
            Ok(trail) => {
                debug!(path = %trail.path().display(), "recording attempts");
                synth = synth.with_trail(trail);
            }
            Err(e) => warn!(error = %e, "attempt trail disabled"),
        }
    }

    let outcome = synth.run(transcript, &task.prompt, spec).await;
    write_outputs(&outcome, &task.out_dir)?;
    Ok(outcome)
}

/// Write the final candidate and the attempt report.
pub fn write_outputs(outcome: &LoopOutcome, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let function = out_dir.join(FUNCTION_FILE);
    std::fs::write(&function, &outcome.result.final_candidate_source)
        .with_context(|| format!("failed to write {}", function.display()))?;

    let report = out_dir.join(REPORT_FILE);
    let body = serde_json::to_string_pretty(&json!({
        "result": outcome.result,
        "attempts": outcome.attempts,
        "session": outcome.session,
    }))?;
    std::fs::write(&report, body).with_context(|| format!("failed to write {}", report.display()))?;

    Ok((function, report))
}

fn report(outcome: &LoopOutcome, task: &TaskArgs, json: bool) -> Result<()> {
    let result = &outcome.result;
    if json {
        print_json(&json!({
            "testPassed": result.test_passed,
            "attemptsUsed": result.attempts_used,
            "sessionId": result.generation_session_id,
            "function": task.out_dir.join(FUNCTION_FILE).display().to_string(),
            "verdicts": outcome.attempts.iter().map(|a| a.verdict).collect::<Vec<_>>(),
        }));
        return Ok(());
    }

    for attempt in &outcome.attempts {
        let mark = if attempt.verdict.is_pass() { "[OK]" } else { "[!!]" };
        println!("{mark} Attempt {}: {}", attempt.index, attempt.verdict);
    }
    println!();
    if result.test_passed {
        println!("Status: PASSED after {} attempt(s)", result.attempts_used);
    } else {
        println!("Status: FAILED after {} attempt(s)", result.attempts_used);
    }
    if let Some(id) = &result.generation_session_id {
        println!("  Session: {id}");
    }
    println!("  Function: {}", task.out_dir.join(FUNCTION_FILE).display());
    println!("  Report: {}", task.out_dir.join(REPORT_FILE).display());
    Ok(())
}
