//! Application state shared across request handlers.

use std::sync::Arc;

use notecast_broadcast::Publisher;

use crate::notes::NoteRepository;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    notes: NoteRepository,
    publisher: Publisher,
}

impl AppState {
    pub fn new(notes: NoteRepository, publisher: Publisher) -> Self {
        Self {
            inner: Arc::new(AppStateInner { notes, publisher }),
        }
    }

    pub fn notes(&self) -> &NoteRepository {
        &self.inner.notes
    }

    pub fn publisher(&self) -> &Publisher {
        &self.inner.publisher
    }
}
