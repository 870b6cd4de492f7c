//! In-memory note repository.
//!
//! Notes live only as long as the process. The repository is the stand-in
//! for a real store; the rest of the service only needs snapshots of what it
//! holds.

use chrono::{DateTime, Utc};
use notecast_events::{AuthorSnapshot, NoteSnapshot};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// Longest accepted title, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// Why a new note was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,

    #[error("title must be at most {max} characters")]
    TitleTooLong { max: usize },

    #[error("content is required")]
    ContentRequired,
}

impl ValidationError {
    /// Request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::TitleRequired | ValidationError::TitleTooLong { .. } => "title",
            ValidationError::ContentRequired => "content",
        }
    }
}

/// A note as submitted, before it has an id.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub author: Option<AuthorSnapshot>,
}

impl NewNote {
    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(ValidationError::TitleRequired);
        } else if title.chars().count() > MAX_TITLE_CHARS {
            errors.push(ValidationError::TitleTooLong {
                max: MAX_TITLE_CHARS,
            });
        }

        if self.content.trim().is_empty() {
            errors.push(ValidationError::ContentRequired);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<AuthorSnapshot>,
}

impl Note {
    /// Immutable copy of the note for event payloads.
    pub fn snapshot(&self) -> NoteSnapshot {
        NoteSnapshot {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Default)]
struct Notes {
    last_id: i64,
    items: Vec<Note>,
}

/// Process-local note storage.
#[derive(Debug, Default)]
pub struct NoteRepository {
    notes: RwLock<Notes>,
}

impl NoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a validated note and assigns the next id.
    pub async fn create(&self, new: NewNote) -> Note {
        let mut notes = self.notes.write().await;
        notes.last_id += 1;

        let note = Note {
            id: notes.last_id,
            title: new.title.trim().to_string(),
            content: new.content,
            created_at: Utc::now(),
            author: new.author,
        };
        notes.items.push(note.clone());
        note
    }

    /// All notes, newest first.
    pub async fn list(&self) -> Vec<Note> {
        let notes = self.notes.read().await;
        notes.items.iter().rev().cloned().collect()
    }
}
