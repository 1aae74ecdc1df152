//! Code-generation agent seam.
//!
//! An agent accepts a set of named files once per session, then answers each
//! message with an updated file set.

mod scripted;
mod v0;

pub use scripted::ScriptedAgent;
pub use v0::{V0Agent, DEFAULT_API_URL as V0_API_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from an agent round trip.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("agent has no scripted reply left")]
    Exhausted,

    #[error("{0}")]
    Rejected(String),
}

/// A file handed to the agent when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub name: String,
    pub content: String,
    /// Locked files must not be modified by the agent.
    pub locked: bool,
}

impl VirtualFile {
    pub fn locked(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            locked: true,
        }
    }

    pub fn editable(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            locked: false,
        }
    }
}

/// A file in an agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFile {
    pub path: String,
    pub source: String,
}

/// One agent reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReply {
    pub files: Vec<AgentFile>,
}

impl AgentReply {
    /// The file whose path contains `path`, last one wins.
    pub fn file(&self, path: &str) -> Option<&AgentFile> {
        self.files.iter().rev().find(|f| f.path.contains(path))
    }
}

#[async_trait]
pub trait CodeAgent: Send + Sync {
    /// Open a session over `files`, returning its id.
    async fn open_session(&self, files: &[VirtualFile]) -> Result<String, AgentError>;

    /// Send a message within a session.
    async fn send(&self, session_id: &str, message: &str) -> Result<AgentReply, AgentError>;
}
