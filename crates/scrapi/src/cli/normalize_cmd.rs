//! `scrapi normalize`

use anyhow::{Context, Result};
use scrapi_core::normalize::normalize_text;
use std::path::Path;

pub fn run(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    println!("{}", normalize_text(&raw));
    Ok(())
}
