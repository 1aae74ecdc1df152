//! Synthesis-test-retry loop.
//!
//! Drives a generation agent over a frozen [`Transcript`] until a candidate
//! passes the test executor or the attempt budget runs out. Once the loop
//! starts it never returns an error: agent faults become a placeholder
//! candidate and executor faults become [`Verdict::FailError`] attempts.

pub mod files;
pub mod prompt;
pub mod session;

pub use session::{GenerationSession, Role, SessionEntry};

use crate::agent::{AgentReply, CodeAgent, VirtualFile};
use crate::audit::AttemptTrail;
use crate::executor::{TestExecutor, TestRequest};
use crate::types::{Attempt, LoopResult, SchemaSpec, Transcript, Verdict};
use files::{CANDIDATE_PATH, PLACEHOLDER_CANDIDATE};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts per invocation, the first one included.
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Generating,
    Testing,
    Retrying,
    Done,
    Terminal,
}

/// Everything one loop invocation produced.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub result: LoopResult,
    /// Attempt trail, oldest first. The last entry decides the result.
    pub attempts: Vec<Attempt>,
    pub session: GenerationSession,
}

pub struct SynthesisLoop {
    agent: Arc<dyn CodeAgent>,
    executor: Arc<dyn TestExecutor>,
    trail: Option<AttemptTrail>,
}

impl SynthesisLoop {
    pub fn new(agent: Arc<dyn CodeAgent>, executor: Arc<dyn TestExecutor>) -> Self {
        Self {
            agent,
            executor,
            trail: None,
        }
    }

    /// Append every attempt to `trail`.
    pub fn with_trail(mut self, trail: AttemptTrail) -> Self {
        self.trail = Some(trail);
        self
    }

    pub async fn run(&self, transcript: Transcript, goal: &str, spec: &SchemaSpec) -> LoopOutcome {
        let files = files::build_files(&transcript, spec);
        let mut session = GenerationSession::default();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut message = prompt::task_prompt(goal);
        let mut candidate = String::new();
        let mut state = LoopState::Init;

        loop {
            debug!(?state, attempt = attempts.len() + 1, "synthesis state");
            state = match state {
                LoopState::Init => {
                    info!(
                        url = %transcript.url,
                        events = transcript.len(),
                        files = files.len(),
                        "starting synthesis"
                    );
                    LoopState::Generating
                }
                LoopState::Generating => {
                    candidate = self.generate(&mut session, &files, &message).await;
                    LoopState::Testing
                }
                LoopState::Testing => {
                    let report = self
                        .executor
                        .run(&TestRequest::new(spec, candidate.clone()))
                        .await;
                    let attempt = Attempt {
                        index: attempts.len() as u32 + 1,
                        candidate_source: candidate.clone(),
                        verdict: report.verdict(),
                        diagnostic_output: report.test_result,
                    };
                    info!(
                        attempt = attempt.index,
                        verdict = %attempt.verdict,
                        "candidate tested"
                    );
                    if let Some(trail) = &self.trail {
                        if let Err(e) = trail.record(session.id.as_deref(), &attempt) {
                            warn!(error = %e, "failed to record attempt");
                        }
                    }
                    let verdict = attempt.verdict;
                    attempts.push(attempt);

                    if verdict.is_pass() {
                        LoopState::Done
                    } else if (attempts.len() as u32) < MAX_ATTEMPTS {
                        LoopState::Retrying
                    } else {
                        LoopState::Terminal
                    }
                }
                LoopState::Retrying => {
                    // A session that never opened still needs the task prompt.
                    if session.is_open() {
                        if let Some(last) = attempts.last() {
                            message =
                                prompt::correction_message(last.verdict, &last.diagnostic_output);
                        }
                    }
                    LoopState::Generating
                }
                LoopState::Done | LoopState::Terminal => break,
            };
        }

        let test_passed = attempts.last().is_some_and(|a| a.verdict == Verdict::Pass);
        info!(
            passed = test_passed,
            attempts = attempts.len(),
            session_id = session.id.as_deref().unwrap_or("-"),
            "synthesis finished"
        );

        LoopOutcome {
            result: LoopResult {
                final_candidate_source: candidate,
                test_passed,
                generation_session_id: session.id.clone(),
                attempts_used: attempts.len() as u32,
            },
            attempts,
            session,
        }
    }

    /// One agent round trip. Always yields a candidate.
    async fn generate(
        &self,
        session: &mut GenerationSession,
        files: &[VirtualFile],
        message: &str,
    ) -> String {
        let session_id = match &session.id {
            Some(id) => id.clone(),
            None => match self.agent.open_session(files).await {
                Ok(id) => {
                    info!(session_id = %id, "generation session opened");
                    session.id = Some(id.clone());
                    id
                }
                Err(e) => {
                    warn!(error = %e, "failed to open generation session");
                    session.push(Role::Error, e.to_string());
                    return PLACEHOLDER_CANDIDATE.to_string();
                }
            },
        };

        session.push(Role::User, message);
        match self.agent.send(&session_id, message).await {
            Ok(reply) => {
                session.push(Role::Agent, describe_reply(&reply));
                match reply.file(CANDIDATE_PATH) {
                    Some(file) => file.source.clone(),
                    None => {
                        warn!(files = reply.files.len(), "reply has no {}", CANDIDATE_PATH);
                        PLACEHOLDER_CANDIDATE.to_string()
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "generation round trip failed");
                session.push(Role::Error, e.to_string());
                PLACEHOLDER_CANDIDATE.to_string()
            }
        }
    }
}

fn describe_reply(reply: &AgentReply) -> String {
    if reply.files.is_empty() {
        return "(no files)".to_string();
    }
    reply
        .files
        .iter()
        .map(|f| format!("{} ({} bytes)", f.path, f.source.len()))
        .collect::<Vec<_>>()
        .join(", ")
}
