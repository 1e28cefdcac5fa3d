//! Driving ports for note operations.
//!
//! HTTP handlers call [`NoteCommand`] to create and update notes and
//! [`NoteQuery`] to read them. Updates carry the version the client last saw
//! so stale writes surface as conflicts instead of overwriting newer data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Error, Note};

/// Request to create a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    /// Short heading; must not be blank.
    pub title: String,
    /// Free-form content.
    pub body: String,
}

/// Request to update an existing note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    /// Note to update.
    pub id: Uuid,
    /// Replacement heading; must not be blank.
    pub title: String,
    /// Replacement content.
    pub body: String,
    /// Version the client last observed. The update is rejected with a
    /// conflict when the stored note has moved on.
    pub expected_version: u32,
}

/// Use-case port for note mutations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NoteCommand: Send + Sync {
    /// Create a note stamped with the commit instant at version 1.
    async fn create(&self, request: CreateNoteRequest) -> Result<Note, Error>;

    /// Update a note, bumping its version.
    ///
    /// # Errors
    ///
    /// - Not found when the note does not exist.
    /// - Conflict when `expected_version` is stale or a concurrent writer
    ///   committed first.
    async fn update(&self, request: UpdateNoteRequest) -> Result<Note, Error>;
}

/// Use-case port for note reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NoteQuery: Send + Sync {
    /// Fetch a note by identifier.
    async fn fetch(&self, id: Uuid) -> Result<Note, Error>;
}
