use serde::{Deserialize, Serialize};

/// Who produced a session entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    /// A failed round trip, recorded in place of the agent's reply.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub role: Role,
    pub text: String,
}

/// Append-only message log of one generation session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSession {
    /// Set once the agent accepts the session.
    pub id: Option<String>,
    pub entries: Vec<SessionEntry>,
}

impl GenerationSession {
    pub fn is_open(&self) -> bool {
        self.id.is_some()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(SessionEntry {
            role,
            text: text.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_ordered() {
        let mut s = GenerationSession::default();
        assert!(!s.is_open());
        s.push(Role::User, "a");
        s.push(Role::Agent, "b");
        s.push(Role::User, "c");
        let texts: Vec<&str> = s.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(s.entries[1].role, Role::Agent);
    }
}
