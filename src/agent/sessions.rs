//! Saved conversation transcripts
//!
//! Lets a host save a session's history to disk and restore it later with
//! [`ConversationSession::restore_turns`](super::ConversationSession::restore_turns).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::session::{ConversationSession, Turn};

/// A saved conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Unique transcript ID
    pub id: String,
    /// Display name, also used for the file name
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Model the conversation was held with
    pub model: String,
    pub turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            model: model.into(),
            turns: Vec::new(),
        }
    }

    /// Snapshot a live session
    pub fn from_session(name: impl Into<String>, session: &ConversationSession) -> Self {
        let mut transcript = Self::new(name, session.config().model.model.clone());
        transcript.id = session.id().to_string();
        transcript.turns = session.turns().to_vec();
        transcript
    }

    /// Replace the turns with a newer snapshot
    ///
    /// `id` and `created_at` are kept.
    pub fn update(&mut self, session: &ConversationSession) {
        self.model = session.config().model.model.clone();
        self.turns = session.turns().to_vec();
        self.updated_at = Utc::now();
    }
}

/// Transcript storage manager
pub struct TranscriptStore {
    /// Directory holding one JSON file per transcript
    base_dir: PathBuf,
}

impl TranscriptStore {
    /// Create a store, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Create with default directory (~/.lynexus/transcripts)
    pub fn default_store() -> std::io::Result<Self> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(PathBuf::from(home).join(".lynexus").join("transcripts"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Save a transcript, overwriting any previous file with the same name
    pub fn save(&self, transcript: &Transcript) -> std::io::Result<PathBuf> {
        let path = self.transcript_path(&transcript.name);
        let json = serde_json::to_string_pretty(transcript)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Save a session's history under `name`
    ///
    /// An earlier transcript with the same name is updated in place, so it
    /// keeps its ID and creation time.
    pub fn save_session(&self, name: &str, session: &ConversationSession) -> std::io::Result<PathBuf> {
        let transcript = match self.load(name) {
            Ok(mut existing) => {
                existing.update(session);
                existing
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(name, error = %e, "Replacing unreadable transcript");
                }
                Transcript::from_session(name, session)
            }
        };
        self.save(&transcript)
    }

    /// Load a transcript by name
    pub fn load(&self, name: &str) -> std::io::Result<Transcript> {
        load_from_path(&self.transcript_path(name))
    }

    /// List stored transcripts, most recently updated first
    ///
    /// Files that fail to parse are skipped.
    pub fn list(&self) -> std::io::Result<Vec<TranscriptSummary>> {
        let mut transcripts = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match load_from_path(&path) {
                    Ok(t) => transcripts.push(TranscriptSummary {
                        id: t.id,
                        name: t.name,
                        model: t.model,
                        updated_at: t.updated_at,
                        turns: t.turns.len(),
                    }),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable transcript");
                    }
                }
            }
        }
        transcripts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(transcripts)
    }

    pub fn delete(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.transcript_path(name))
    }

    fn transcript_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", file_stem(name)))
    }
}

/// Summary of a transcript for listing
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSummary {
    pub id: String,
    pub name: String,
    pub model: String,
    pub updated_at: DateTime<Utc>,
    pub turns: usize,
}

fn load_from_path(path: &Path) -> std::io::Result<Transcript> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// File stem for a display name
///
/// Characters other than alphanumerics, `-` and `_` become `_`. When that
/// changes the name, a short hash of the original is appended so names such
/// as `a b` and `a/b` do not share a file.
fn file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if !cleaned.is_empty() && cleaned == name {
        return cleaned;
    }

    let digest = Sha256::digest(name.as_bytes());
    let stem = if cleaned.is_empty() { "untitled" } else { &cleaned };
    format!("{}-{}", stem, hex::encode(&digest[..4]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Role;

    fn turn(role: Role, content: &str, seq: usize) -> Turn {
        Turn {
            role,
            content: content.to_string(),
            seq,
        }
    }

    #[test]
    fn test_transcript_creation() {
        let transcript = Transcript::new("Prime numbers", "deepseek-chat");
        assert!(!transcript.id.is_empty());
        assert_eq!(transcript.name, "Prime numbers");
        assert_eq!(transcript.model, "deepseek-chat");
        assert!(transcript.turns.is_empty());
        assert_eq!(transcript.created_at, transcript.updated_at);
    }

    #[test]
    fn test_save_load_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("transcripts")).unwrap();

        let mut transcript = Transcript::new("math/chat 1", "m");
        transcript.turns = vec![turn(Role::User, "2+3?", 0), turn(Role::Assistant, "5", 1)];

        let path = store.save(&transcript).unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("math_chat_1-"));

        let loaded = store.load("math/chat 1").unwrap();
        assert_eq!(loaded, transcript);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].turns, 2);

        store.delete("math/chat 1").unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(store.load("math/chat 1").is_err());
    }

    #[test]
    fn test_list_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("notes_2024"), "notes_2024");
        assert_eq!(file_stem("日记-1"), "日记-1");
        assert!(file_stem("  ").starts_with("untitled-"));
        assert!(file_stem("a b/c").starts_with("a_b_c-"));
        assert_eq!(file_stem("a b"), file_stem("a b"));
    }

    #[test]
    fn test_similar_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();

        for name in ["a b", "a/b", "a_b"] {
            let mut transcript = Transcript::new(name, "m");
            transcript.turns = vec![turn(Role::User, name, 0)];
            store.save(&transcript).unwrap();
        }

        assert_eq!(store.list().unwrap().len(), 3);
        for name in ["a b", "a/b", "a_b"] {
            let loaded = store.load(name).unwrap();
            assert_eq!(loaded.name, name);
            assert_eq!(loaded.turns[0].content, name);
        }
    }
}
