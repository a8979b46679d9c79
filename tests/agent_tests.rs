//! Integration tests for the agent surface: presets, prompts, the command
//! wire format and transcripts.
//!
//! Tests that need a live model endpoint are marked #[ignore].

mod common;

use std::sync::Arc;

use common::{cmd_config, math_registry, ScriptedModel};
use lynexus::agent::{Role, Transcript, TranscriptStore};
use lynexus::llm::{self, ChatMessage, ModelProvider};
use lynexus::protocol::Parse;
use lynexus::{format_command, parse_command, prompt, ConversationSession, Markers, ParsedCommand, SessionConfig};

/// Test that SessionConfig has sensible defaults
#[test]
fn test_session_config_defaults() {
    let config = SessionConfig::default();

    assert_eq!(config.model.provider, ModelProvider::OpenAi);
    assert_eq!(config.model.model, "deepseek-chat");
    assert_eq!(config.max_iterations, 15);
    assert_eq!(config.markers(), Markers::default());
    assert!(config.system_prompt.is_none());
    assert!(config.tools.builtin.is_empty());
}

/// Test that a JSON preset overrides only what it names
#[test]
fn test_session_config_json_preset() {
    let config = SessionConfig::from_json(
        r#"{
            "model": { "api_base": "http://localhost:8000/v1", "api_key": "sk-test", "model": "qwen" },
            "sampling": { "temperature": 0.3, "max_tokens": 512 },
            "max_iterations": 5,
            "system_prompt": "You are a helpful file assistant.",
            "tools": { "builtin": ["files"] }
        }"#,
    )
    .unwrap();

    assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.sampling.max_tokens, Some(512));
    assert_eq!(config.max_iterations, 5);
    assert_eq!(config.command_start, "YLDEXECUTE:");
    assert!(config.validate().is_ok());
}

/// Test ChatMessage construction with helper methods
#[test]
fn test_chat_message_construction() {
    let user_msg = ChatMessage::user("Hello, world!");
    assert_eq!(user_msg.role, "user");
    assert_eq!(user_msg.content, "Hello, world!");

    assert_eq!(ChatMessage::system("You are helpful.").role, "system");
    assert_eq!(ChatMessage::assistant("I can help!").role, "assistant");
    assert_eq!(ChatMessage::tool("Result: 42").role, "tool");
}

/// Test the command wire format in both directions
#[test]
fn test_command_wire_format() {
    let markers = Markers::new("CMD:", "|");
    let command = ParsedCommand::new("add", vec!["2".into(), "3".into()]);

    let line = format_command(&command, &markers);
    assert_eq!(line, "CMD:add|2|3");
    assert_eq!(parse_command(&line, &markers), Parse::Command(command));
}

/// Test that the generated prompt teaches the configured markers
#[tokio::test]
async fn test_prompt_lists_tools_with_markers() {
    let registry = math_registry().await;
    let text = prompt::compose(&cmd_config(3), &registry);

    assert!(text.contains("- add(a: number, b: number): Add two numbers"));
    assert!(text.contains("CMD:tool_name|param1|param2"));
    assert!(!text.contains("YLDEXECUTE:"));
}

/// Test saving a conversation and restoring it into a new session
#[tokio::test]
async fn test_transcript_save_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let store = TranscriptStore::new(dir.path()).unwrap();
    let registry = math_registry().await;

    let model = Arc::new(ScriptedModel::new(&["CMD:add|2|3", "5"]));
    let mut session = ConversationSession::new(cmd_config(5), Arc::clone(&registry), model);
    session.submit("2+3?").await.unwrap();

    store.save(&Transcript::from_session("math", &session)).unwrap();

    let restored_model = Arc::new(ScriptedModel::new(&["You asked about 2+3."]));
    let mut restored = ConversationSession::new(cmd_config(5), registry, restored_model.clone());
    restored.restore_turns(store.load("math").unwrap().turns);

    assert_eq!(restored.turns(), session.turns());

    restored.submit("what did I ask?").await.unwrap();
    let request = restored_model.request(1);
    // system + 4 restored turns + new user turn
    assert_eq!(request.len(), 6);
    assert_eq!(request[3].content, "Execution result: 5");
    assert_eq!(restored.turns()[4].role, Role::User);
}

/// Test that saving under an existing name keeps the transcript's identity
#[tokio::test]
async fn test_resave_keeps_creation_time() {
    let dir = tempfile::tempdir().unwrap();
    let store = TranscriptStore::new(dir.path()).unwrap();
    let registry = math_registry().await;

    let model = Arc::new(ScriptedModel::new(&["hi", "still here"]));
    let mut session = ConversationSession::new(cmd_config(5), registry, model);

    session.submit("hello").await.unwrap();
    store.save_session("chat", &session).unwrap();
    let first = store.load("chat").unwrap();

    std::thread::sleep(std::time::Duration::from_millis(10));
    session.submit("again").await.unwrap();
    store.save_session("chat", &session).unwrap();
    let second = store.load("chat").unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.turns.len(), 4);
    assert_eq!(store.list().unwrap().len(), 1);
}

/// Test against a live OpenAI-compatible endpoint
/// Run with: cargo test test_live_model -- --ignored
#[tokio::test]
#[ignore]
async fn test_live_model() {
    let config = SessionConfig::from_file("preset.yaml").expect("preset.yaml with a reachable model");
    let model = llm::client_for(&config.model);
    let mut session = ConversationSession::new(config, math_registry().await, model);

    let outcome = session.submit("Say hello in one word.").await.unwrap();
    assert!(outcome.completed);
    assert!(!outcome.content.is_empty());
}
