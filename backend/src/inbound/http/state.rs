//! Shared HTTP adapter state.
//!
//! Handlers receive this state via `actix_web::web::Data` so they depend only
//! on domain ports and stay testable without a real store.

use std::sync::Arc;

use crate::domain::ports::{NoteCommand, NoteQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub notes: Arc<dyn NoteCommand>,
    pub notes_query: Arc<dyn NoteQuery>,
}

impl HttpState {
    /// Bundle the note ports.
    pub fn new(notes: Arc<dyn NoteCommand>, notes_query: Arc<dyn NoteQuery>) -> Self {
        Self { notes, notes_query }
    }
}
