//! `scrapi test`

use super::{print_json, SchemaArgs};
use crate::config::Settings;
use anyhow::{Context, Result};
use scrapi_core::executor::{TestReport, TestRequest};
use scrapi_core::Verdict;
use std::path::Path;

pub async fn run(settings: &Settings, script: &Path, schema: &SchemaArgs, json: bool) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read {}", script.display()))?;
    let spec = schema.to_spec()?;

    let report = settings.executor().run(&TestRequest::new(&spec, source)).await;
    if json {
        print_json(&serde_json::json!({
            "verdict": report.verdict(),
            "report": report,
        }));
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &TestReport) {
    match report.verdict() {
        Verdict::Pass => println!("[OK] Test passed"),
        Verdict::FailEmpty => println!("[!!] Test returned an empty result"),
        Verdict::FailError => println!("[!!] Test failed"),
    }
    if let Some(err) = &report.validation_error {
        println!("  Validation: {err}");
    }
    println!();
    println!("{}", report.test_result);
}
