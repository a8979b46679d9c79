//! Conversation session - the bounded command/dispatch loop
//!
//! ```text
//!            submit(text)
//!   Idle ──────────────► AwaitingModel ◄─────────────────┐
//!                             │ model call                │ below cap,
//!                             ▼                           │ not cancelled
//!                      ParsingResponse ──► Dispatching ───┘
//!                             │ prose          │
//!                             ▼                ├── cap reached ──► IterationLimitReached
//!                         Completed            └── cancelled ────► Cancelled
//! ```
//!
//! Each submission gets `max_iterations` model calls. Protocol, lookup,
//! validation and execution failures become tool turns and the loop keeps
//! going; only a failed model call is returned to the caller, with history
//! intact so the caller can [`ConversationSession::resume`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::dispatcher::{Dispatcher, ExecutionResult};
use crate::config::SessionConfig;
use crate::llm::{ChatMessage, ModelClient, TransportError};
use crate::metrics::{
    MODEL_CALLS, MODEL_CALL_DURATION, PROTOCOL_ERRORS, SUBMISSIONS, SUBMISSION_ITERATIONS,
};
use crate::prompt;
use crate::protocol::{parse_command, Markers, Parse};
use crate::tools::ToolRegistry;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Position in the history, starting at 0 with no gaps
    pub seq: usize,
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingModel,
    ParsingResponse,
    Dispatching,
    Completed,
    IterationLimitReached,
    Cancelled,
}

/// Why a submission stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered in prose
    Completed,
    /// The iteration budget ran out while the model was still calling tools
    IterationLimit,
    /// Cancellation was observed between states
    Cancelled,
}

impl StopReason {
    fn label(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::IterationLimit => "iteration_limit",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Result of [`ConversationSession::submit`] or [`ConversationSession::resume`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Final answer, or the content of the last turn when not completed
    pub content: String,
    pub completed: bool,
    pub stop: StopReason,
    /// Model calls made for this submission
    pub iterations: usize,
    /// Commands dispatched for this submission
    pub tool_calls: usize,
}

/// Cooperative cancellation flag shared with other tasks
///
/// Checked between states only; an in-flight model call or tool runs to
/// completion first.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Read and clear the flag
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Error type for session operations
#[derive(Debug)]
pub enum SessionError {
    /// The model collaborator failed; the session is paused and resumable
    Transport(TransportError),
    /// `resume` was called but the last turn is not awaiting a model reply
    NothingToResume,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Transport(e) => write!(f, "Model call failed: {}", e),
            SessionError::NothingToResume => {
                write!(f, "Nothing to resume: the conversation is not waiting on the model")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Transport(e) => Some(e),
            SessionError::NothingToResume => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

/// One logical chat driven against a shared tool registry
pub struct ConversationSession {
    id: String,
    config: SessionConfig,
    markers: Markers,
    system_prompt: String,
    dispatcher: Dispatcher,
    model: Arc<dyn ModelClient>,
    turns: Vec<Turn>,
    iterations: usize,
    state: SessionState,
    cancel: CancelHandle,
}

impl ConversationSession {
    /// Create a session
    ///
    /// # Arguments
    /// * `config` - Preset record; assumed to have passed `validate()`
    /// * `registry` - Tool registry, shared read-only with other sessions
    /// * `model` - Model-invocation collaborator
    pub fn new(
        config: SessionConfig,
        registry: Arc<ToolRegistry>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        let system_prompt = prompt::compose(&config, &registry);
        let markers = config.markers();
        let id = Uuid::now_v7().to_string();

        debug!(
            session_id = %id,
            model = model.model(),
            tools = registry.len(),
            max_iterations = config.max_iterations,
            "Created conversation session"
        );

        Self {
            id,
            config,
            markers,
            system_prompt,
            dispatcher: Dispatcher::new(registry),
            model,
            turns: Vec::new(),
            iterations: 0,
            state: SessionState::Idle,
            cancel: CancelHandle::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.dispatcher.registry()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Model calls made for the current submission
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Handle for requesting cancellation from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Append a user turn and run the loop until it stops
    pub async fn submit(&mut self, text: impl Into<String>) -> Result<SubmitOutcome, SessionError> {
        let text = text.into();
        self.cancel.clear();
        self.iterations = 0;
        self.push_turn(Role::User, text);
        self.run("submit").await
    }

    /// Continue a paused loop with a fresh iteration budget
    ///
    /// Possible when the last turn is a user or tool turn: after a transport
    /// error, the iteration limit, a cancellation, or a restored transcript
    /// that ends mid-loop.
    pub async fn resume(&mut self) -> Result<SubmitOutcome, SessionError> {
        match self.turns.last() {
            Some(turn) if turn.role != Role::Assistant => {}
            _ => return Err(SessionError::NothingToResume),
        }
        self.cancel.clear();
        self.iterations = 0;
        self.run("resume").await
    }

    /// Drop the history and the iteration counter
    ///
    /// Configuration, system prompt and registry are kept.
    pub fn reset_conversation(&mut self) {
        self.turns.clear();
        self.iterations = 0;
        self.state = SessionState::Idle;
        self.cancel.clear();
        info!(session_id = %self.id, "Conversation reset");
    }

    /// Replace the history, e.g. from a saved transcript
    ///
    /// Sequence numbers are reassigned in order.
    pub fn restore_turns(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.reset_conversation();
        for turn in turns {
            self.push_turn(turn.role, turn.content);
        }
    }

    async fn run(&mut self, trigger: &'static str) -> Result<SubmitOutcome, SessionError> {
        let submission_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "submission",
            session_id = %self.id,
            submission_id = %submission_id,
            trigger,
            otel.name = "submission"
        );

        async {
            info!(turns = self.turns.len(), "Processing submission");
            let result = self.drive().await;

            match &result {
                Ok(outcome) => {
                    SUBMISSIONS.with_label_values(&[outcome.stop.label()]).inc();
                    SUBMISSION_ITERATIONS.observe(outcome.iterations as f64);
                    info!(
                        stop = outcome.stop.label(),
                        iterations = outcome.iterations,
                        tool_calls = outcome.tool_calls,
                        "Submission finished"
                    );
                }
                Err(e) => {
                    SUBMISSIONS.with_label_values(&["transport_error"]).inc();
                    warn!(iterations = self.iterations, error = %e, "Submission paused");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) -> Result<SubmitOutcome, SessionError> {
        let mut tool_calls = 0;

        loop {
            if self.cancel.take() {
                self.state = SessionState::Cancelled;
                return Ok(self.stopped(StopReason::Cancelled, tool_calls));
            }
            if self.iterations >= self.config.max_iterations {
                self.state = SessionState::IterationLimitReached;
                return Ok(self.stopped(StopReason::IterationLimit, tool_calls));
            }

            self.state = SessionState::AwaitingModel;
            self.iterations += 1;
            let output = self.call_model().await?;

            self.state = SessionState::ParsingResponse;
            let result = match parse_command(&output, &self.markers) {
                Parse::NoCommand => {
                    self.push_turn(Role::Assistant, output.clone());
                    self.state = SessionState::Completed;
                    return Ok(SubmitOutcome {
                        content: output,
                        completed: true,
                        stop: StopReason::Completed,
                        iterations: self.iterations,
                        tool_calls,
                    });
                }
                Parse::Command(command) => {
                    self.push_turn(Role::Assistant, output);
                    self.state = SessionState::Dispatching;
                    tool_calls += 1;
                    self.dispatcher.dispatch(&command).await
                }
                Parse::Malformed(e) => {
                    warn!(iteration = self.iterations, error = %e, "Malformed command from model");
                    PROTOCOL_ERRORS.inc();
                    self.push_turn(Role::Assistant, output);
                    self.state = SessionState::Dispatching;
                    ExecutionResult::protocol_error(&e)
                }
            };

            debug!(
                iteration = self.iterations,
                success = result.success,
                "Appending tool result"
            );
            self.push_turn(Role::Tool, result.content);
        }
    }

    async fn call_model(&self) -> Result<String, TransportError> {
        let model = self.model.model().to_string();
        let span = info_span!(
            "model_call",
            iteration = self.iterations,
            model = %model,
            otel.name = "model_call"
        );

        let messages = self.messages();
        let start = Instant::now();
        let result = self
            .model
            .complete(&messages, &self.config.sampling)
            .instrument(span)
            .await;
        let elapsed = start.elapsed();

        MODEL_CALL_DURATION
            .with_label_values(&[&model])
            .observe(elapsed.as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        MODEL_CALLS.with_label_values(&[&model, status]).inc();

        debug!(
            iteration = self.iterations,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            status,
            "Model call finished"
        );
        result
    }

    /// History as sent to the model: system prompt first, tool turns
    /// rendered through the result template
    fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.as_str()));
        }
        messages.extend(self.turns.iter().map(|turn| match turn.role {
            Role::User => ChatMessage::user(turn.content.as_str()),
            Role::Assistant => ChatMessage::assistant(turn.content.as_str()),
            Role::Tool => ChatMessage::tool(self.config.render_tool_result(&turn.content)),
        }));
        messages
    }

    fn push_turn(&mut self, role: Role, content: String) {
        let seq = self.turns.len();
        self.turns.push(Turn { role, content, seq });
    }

    fn stopped(&self, stop: StopReason, tool_calls: usize) -> SubmitOutcome {
        SubmitOutcome {
            content: self.turns.last().map(|t| t.content.clone()).unwrap_or_default(),
            completed: false,
            stop,
            iterations: self.iterations,
            tool_calls,
        }
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("model", &self.model.model())
            .field("state", &self.state)
            .field("turns", &self.turns.len())
            .field("iterations", &self.iterations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SamplingConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed script and records every request
    struct Scripted {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelClient for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _sampling: &SamplingConfig,
        ) -> Result<String, TransportError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| TransportError::Other("script exhausted".into()))
        }
    }

    fn session(model: Arc<Scripted>) -> ConversationSession {
        let config = SessionConfig {
            command_start: "CMD:".into(),
            command_separator: "|".into(),
            max_iterations: 3,
            ..Default::default()
        };
        ConversationSession::new(config, Arc::new(ToolRegistry::default()), model)
    }

    #[tokio::test]
    async fn test_turn_sequence_is_gapless() {
        let model = Scripted::new(&["CMD:nope", "done"]);
        let mut session = session(model);

        let outcome = session.submit("hi").await.unwrap();
        assert!(outcome.completed);
        let seqs: Vec<_> = session.turns().iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_tool_turns_use_result_template() {
        let model = Scripted::new(&["CMD:nope", "done"]);
        let mut session = session(model.clone());
        session.submit("hi").await.unwrap();

        let seen = model.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second[0].role, "system");
        let last = second.last().unwrap();
        assert_eq!(last.role, "tool");
        assert_eq!(last.content, "Execution result: Tool 'nope' does not exist");
    }

    #[tokio::test]
    async fn test_resume_requires_pending_turn() {
        let model = Scripted::new(&["hello"]);
        let mut session = session(model);

        assert!(matches!(session.resume().await, Err(SessionError::NothingToResume)));
        session.submit("hi").await.unwrap();
        assert!(matches!(session.resume().await, Err(SessionError::NothingToResume)));
    }

    #[tokio::test]
    async fn test_restore_renumbers() {
        let mut session = session(Scripted::new(&[]));
        session.restore_turns(vec![
            Turn { role: Role::User, content: "a".into(), seq: 7 },
            Turn { role: Role::Assistant, content: "b".into(), seq: 9 },
        ]);
        let seqs: Vec<_> = session.turns().iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_cancel_handle_take_clears() {
        let handle = CancelHandle::default();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(handle.take());
        assert!(!handle.is_cancelled());
        assert!(!handle.take());
    }
}
