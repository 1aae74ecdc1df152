//! JSONL attempt trail: one line per tested candidate.

use crate::types::{Attempt, Verdict};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Serialize)]
struct TrailRecord<'a> {
    timestamp: String,
    session_id: Option<&'a str>,
    attempt: u32,
    verdict: Verdict,
    diagnostic: &'a str,
    candidate_bytes: usize,
}

/// Append-only record of synthesis attempts.
pub struct AttemptTrail {
    file: Mutex<File>,
    path: PathBuf,
}

impl AttemptTrail {
    /// Open or create the trail file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open attempt trail: {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Open the default trail at ~/.scrapi/attempts.jsonl.
    pub fn default_trail() -> Result<Self> {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".scrapi")
            .join("attempts.jsonl");
        Self::open(&path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, session_id: Option<&str>, attempt: &Attempt) -> Result<()> {
        let line = serde_json::to_string(&TrailRecord {
            timestamp: Utc::now().to_rfc3339(),
            session_id,
            attempt: attempt.index,
            verdict: attempt.verdict,
            diagnostic: &attempt.diagnostic_output,
            candidate_bytes: attempt.candidate_source.len(),
        })?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{line}").context("failed to append to attempt trail")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_records_are_appended_as_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("attempts.jsonl");
        let trail = AttemptTrail::open(&path).unwrap();

        for (index, verdict) in [(1, Verdict::FailEmpty), (2, Verdict::Pass)] {
            trail
                .record(
                    Some("chat-1"),
                    &Attempt {
                        index,
                        candidate_source: "export async function getData() {}".into(),
                        verdict,
                        diagnostic_output: "Result: []".into(),
                    },
                )
                .unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["verdict"], "fail_empty");
        assert_eq!(lines[1]["attempt"], 2);
        assert_eq!(lines[1]["session_id"], "chat-1");
    }
}
