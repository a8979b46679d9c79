//! The conversation loop
//!
//! # Architecture
//!
//! ```text
//! user text → ConversationSession ──► ModelClient::complete(history)
//!                    ▲                        │
//!                    │                        ▼
//!                    │                 parse_command()
//!                    │                   │         │
//!                    │                 prose     command
//!                    │                   │         │
//!                    │               Completed     ▼
//!                    │                      Dispatcher ──► ToolRegistry ──► local fn / MCP server
//!                    │                             │
//!                    └──────── tool turn ◄─────────┘   (until prose, cap, or cancel)
//! ```

pub mod dispatcher;
pub mod session;
pub mod sessions;

pub use dispatcher::{bind_params, Dispatcher, ExecutionResult};
pub use session::{
    CancelHandle, ConversationSession, Role, SessionError, SessionState, StopReason,
    SubmitOutcome, Turn,
};
pub use sessions::{Transcript, TranscriptStore, TranscriptSummary};
