//! Agent that replays queued replies, for tests and offline runs.

use super::{AgentError, AgentFile, AgentReply, CodeAgent, VirtualFile};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays scripted replies in order and records what it was sent.
#[derive(Default)]
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<AgentReply, String>>>,
    open_failures: Mutex<u32>,
    opened: Mutex<Vec<Vec<VirtualFile>>>,
    messages: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply carrying one file.
    pub fn reply_with(self, path: &str, source: &str) -> Self {
        self.push(Ok(AgentReply {
            files: vec![AgentFile {
                path: path.to_string(),
                source: source.to_string(),
            }],
        }))
    }

    /// Queue a reply with no files.
    pub fn reply_empty(self) -> Self {
        self.push(Ok(AgentReply::default()))
    }

    /// Queue a failed round trip.
    pub fn reply_error(self, message: &str) -> Self {
        self.push(Err(message.to_string()))
    }

    /// Make the next `n` session opens fail.
    pub fn fail_opens(self, n: u32) -> Self {
        *lock(&self.open_failures) = n;
        self
    }

    fn push(self, reply: Result<AgentReply, String>) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    /// Messages received so far, in order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    /// File sets of every opened session.
    pub fn opened_sessions(&self) -> Vec<Vec<VirtualFile>> {
        lock(&self.opened).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl CodeAgent for ScriptedAgent {
    async fn open_session(&self, files: &[VirtualFile]) -> Result<String, AgentError> {
        {
            let mut failures = lock(&self.open_failures);
            if *failures > 0 {
                *failures -= 1;
                return Err(AgentError::Rejected("session refused".into()));
            }
        }
        let mut opened = lock(&self.opened);
        opened.push(files.to_vec());
        Ok(format!("scripted-{}", opened.len()))
    }

    async fn send(&self, _session_id: &str, message: &str) -> Result<AgentReply, AgentError> {
        lock(&self.messages).push(message.to_string());
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AgentError::Rejected(message)),
            None => Err(AgentError::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let agent = ScriptedAgent::new()
            .reply_with("scripts/get-data.js", "a")
            .reply_error("boom")
            .fail_opens(1);

        assert!(agent.open_session(&[]).await.is_err());
        let id = agent.open_session(&[]).await.unwrap();
        assert_eq!(id, "scripted-1");

        let first = agent.send(&id, "m1").await.unwrap();
        assert_eq!(first.files[0].source, "a");
        assert!(matches!(agent.send(&id, "m2").await, Err(AgentError::Rejected(m)) if m == "boom"));
        assert!(matches!(agent.send(&id, "m3").await, Err(AgentError::Exhausted)));
        assert_eq!(agent.messages(), vec!["m1", "m2", "m3"]);
    }
}
