//! Console front-end
//!
//! ```text
//! lynexus <preset.json|preset.yaml> [--otlp <endpoint>]
//! ```

use std::env;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use lynexus::agent::{CancelHandle, SessionError, StopReason, SubmitOutcome, TranscriptStore};
use lynexus::tracing::{init_tracing, shutdown_tracing};
use lynexus::{llm, metrics, ConversationSession, SessionConfig, ToolRegistry};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const HELP: &str = "\
Commands:
  exit, quit      leave
  clear           start a new conversation
  resume          continue a conversation that stopped early
  tools           list available tools
  config          show the active preset
  metrics         show Prometheus metrics
  save <name>     save the conversation
  load <name>     load a saved conversation
  history         list saved conversations
  help            show this help
Anything else is sent to the model. Ctrl-C stops the running request.";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let mut preset = None;
    let mut otlp = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--otlp" => otlp = args.next(),
            _ => preset = Some(arg),
        }
    }
    let Some(preset) = preset else {
        eprintln!("usage: lynexus <preset.json|preset.yaml> [--otlp <endpoint>]");
        std::process::exit(2);
    };

    init_tracing("lynexus", otlp.as_deref())?;

    let config = SessionConfig::from_file(&preset)?;
    let registry = Arc::new(ToolRegistry::from_sources(&config.tools).await?);
    let model = llm::client_for(&config.model);
    let store = TranscriptStore::default_store()?;

    println!("[LYNEXUS] Model: {} ({})", config.model.model, config.model.api_base);
    println!("[LYNEXUS] Tools loaded: {}", registry.len());
    println!("[LYNEXUS] Type 'help' for commands.");

    let mut session = ConversationSession::new(config, Arc::clone(&registry), model);
    let result = repl(&mut session, &store).await;

    registry.shutdown().await;
    shutdown_tracing();
    result
}

async fn repl(session: &mut ConversationSession, store: &TranscriptStore) -> Result<(), BoxError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, arg) = line.split_once(' ').map_or((line, ""), |(c, a)| (c, a.trim()));

        match command {
            "" => continue,
            "exit" | "quit" => break,
            "help" => println!("{}", HELP),
            "clear" => {
                session.reset_conversation();
                println!("[LYNEXUS] Conversation cleared.");
            }
            "tools" => {
                for tool in session.registry().list() {
                    println!("  {} - {}", tool.signature(), tool.description);
                }
            }
            "config" => print!("{}", serde_yaml::to_string(&session.config().redacted())?),
            "metrics" => print!("{}", metrics::render()),
            "history" | "save" | "load" if command == "history" || !arg.is_empty() => {
                println!("{}", transcript_command(command, arg, session, store));
            }
            "save" | "load" => println!("[LYNEXUS] usage: {} <name>", command),
            "resume" => {
                let cancel = session.cancel_handle();
                report(run_cancellable(session.resume(), cancel).await);
            }
            _ => {
                let cancel = session.cancel_handle();
                report(run_cancellable(session.submit(line), cancel).await);
            }
        }
    }

    Ok(())
}

/// Run a transcript command and describe the result
///
/// Store failures are reported, never propagated, so the REPL keeps going.
fn transcript_command(
    command: &str,
    name: &str,
    session: &mut ConversationSession,
    store: &TranscriptStore,
) -> String {
    match command {
        "save" => match store.save_session(name, session) {
            Ok(path) => format!("[LYNEXUS] Saved to {}", path.display()),
            Err(e) => format!("[LYNEXUS] Could not save '{}': {}", name, e),
        },
        "load" => match store.load(name) {
            Ok(transcript) => {
                session.restore_turns(transcript.turns);
                format!("[LYNEXUS] Loaded {} turns.", session.turns().len())
            }
            Err(e) => format!("[LYNEXUS] Could not load '{}': {}", name, e),
        },
        _ => match store.list() {
            Ok(transcripts) if transcripts.is_empty() => "[LYNEXUS] No saved conversations.".to_string(),
            Ok(transcripts) => transcripts
                .iter()
                .map(|t| format!("  {}  {} turns  {}", t.name, t.turns, t.updated_at.format("%Y-%m-%d %H:%M")))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("[LYNEXUS] Could not list transcripts: {}", e),
        },
    }
}

/// Drive a submission, turning Ctrl-C into a cancellation request
async fn run_cancellable<F>(submission: F, cancel: CancelHandle) -> Result<SubmitOutcome, SessionError>
where
    F: Future<Output = Result<SubmitOutcome, SessionError>>,
{
    tokio::pin!(submission);
    loop {
        tokio::select! {
            result = &mut submission => return result,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                println!("\n[LYNEXUS] Stopping after the current step...");
            }
        }
    }
}

fn report(result: Result<SubmitOutcome, SessionError>) {
    match result {
        Ok(outcome) => {
            println!("{}", outcome.content);
            match outcome.stop {
                StopReason::Completed => {}
                StopReason::IterationLimit => println!(
                    "[LYNEXUS] Stopped after {} model calls. Type 'resume' to continue.",
                    outcome.iterations
                ),
                StopReason::Cancelled => println!("[LYNEXUS] Cancelled. Type 'resume' to continue."),
            }
        }
        Err(e) => println!("[LYNEXUS] {}. Type 'resume' to retry.", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lynexus::llm::{ChatMessage, ModelClient, SamplingConfig, TransportError};

    struct Echo;

    #[async_trait]
    impl ModelClient for Echo {
        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[ChatMessage], _: &SamplingConfig) -> Result<String, TransportError> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    fn session() -> ConversationSession {
        ConversationSession::new(SessionConfig::default(), Arc::new(ToolRegistry::default()), Arc::new(Echo))
    }

    #[tokio::test]
    async fn test_transcript_commands_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        let mut session = session();
        session.submit("hello").await.unwrap();

        assert!(transcript_command("save", "greeting", &mut session, &store).starts_with("[LYNEXUS] Saved to"));
        assert!(transcript_command("history", "", &mut session, &store).contains("greeting  2 turns"));

        session.reset_conversation();
        assert_eq!(
            transcript_command("load", "greeting", &mut session, &store),
            "[LYNEXUS] Loaded 2 turns."
        );
    }

    #[tokio::test]
    async fn test_store_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("transcripts")).unwrap();
        std::fs::remove_dir(store.base_dir()).unwrap();
        let mut session = session();

        let saved = transcript_command("save", "lost", &mut session, &store);
        assert!(saved.starts_with("[LYNEXUS] Could not save 'lost'"));

        let listed = transcript_command("history", "", &mut session, &store);
        assert!(listed.starts_with("[LYNEXUS] Could not list transcripts"));

        let loaded = transcript_command("load", "lost", &mut session, &store);
        assert!(loaded.starts_with("[LYNEXUS] Could not load 'lost'"));
    }
}
