//! Note domain service implementing the note driving ports.
//!
//! Each call opens a fresh [`UnitOfWork`], stages its change, and commits
//! through the [`CommitInterceptor`] so timestamps and versions are always
//! assigned at commit time.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::{
    CommitStore, CommitStoreError, CreateNoteRequest, NoteCommand, NoteQuery, UpdateNoteRequest,
};
use crate::domain::{CommitError, CommitInterceptor, Error, LoadError, Note, UnitOfWork};

/// Note service backed by a commit interceptor.
pub struct NoteService<S: ?Sized> {
    interceptor: CommitInterceptor<S>,
}

impl<S: ?Sized> Clone for NoteService<S> {
    fn clone(&self) -> Self {
        Self {
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<S: ?Sized> NoteService<S> {
    /// Create a service committing through `interceptor`.
    pub fn new(interceptor: CommitInterceptor<S>) -> Self {
        Self { interceptor }
    }
}

impl<S> NoteService<S>
where
    S: CommitStore + ?Sized,
{
    fn validate_title(title: &str) -> Result<(), Error> {
        if title.trim().is_empty() {
            return Err(Error::invalid_request("title must not be empty").with_details(json!({
                "field": "title",
                "code": "empty_title",
            })));
        }
        Ok(())
    }

    fn version_conflict(expected: u32, actual: u32) -> Error {
        Error::conflict("version mismatch").with_details(json!({
            "expectedVersion": expected,
            "actualVersion": actual,
            "code": "version_mismatch",
        }))
    }

    fn map_store_error(error: CommitStoreError) -> Error {
        match error {
            CommitStoreError::Connection { message } => {
                Error::service_unavailable(format!("note store unavailable: {message}"))
            }
            CommitStoreError::Constraint { message } => {
                Error::conflict(format!("note store constraint violated: {message}"))
                    .with_details(json!({ "code": "constraint_violation" }))
            }
            CommitStoreError::VersionMismatch {
                expected, actual, ..
            } => Self::version_conflict(expected, actual),
            CommitStoreError::Missing { entity } => {
                Error::conflict(format!("{entity} was removed by another writer"))
                    .with_details(json!({ "code": "entity_missing" }))
            }
        }
    }

    fn map_commit_error(error: CommitError) -> Error {
        match error {
            CommitError::Store(store) => Self::map_store_error(store),
            CommitError::Tracking(tracking) => {
                Error::internal(format!("note tracking failed: {tracking}"))
            }
            CommitError::SynchronousCommitUnsupported => {
                Error::internal("synchronous commit is not supported")
            }
        }
    }

    fn map_load_error(error: LoadError) -> Error {
        match error {
            LoadError::Store(store) => Self::map_store_error(store),
            LoadError::Tracking(tracking) => {
                Error::internal(format!("note could not be loaded: {tracking}"))
            }
        }
    }

    fn not_found(id: Uuid) -> Error {
        Error::not_found(format!("note {id} not found"))
    }

    fn committed_note(unit_of_work: &UnitOfWork, id: Uuid) -> Result<Note, Error> {
        unit_of_work
            .get::<Note>(&id.to_string())
            .cloned()
            .ok_or_else(|| Error::internal("committed note is no longer tracked"))
    }
}

#[async_trait]
impl<S> NoteCommand for NoteService<S>
where
    S: CommitStore + ?Sized,
{
    async fn create(&self, request: CreateNoteRequest) -> Result<Note, Error> {
        Self::validate_title(&request.title)?;

        let note = Note::new(request.title, request.body);
        let id = note.id;
        let mut unit_of_work = UnitOfWork::new();
        unit_of_work
            .add(note)
            .map_err(|err| Error::internal(format!("note could not be staged: {err}")))?;

        let committed = self
            .interceptor
            .commit(unit_of_work)
            .await
            .map_err(Self::map_commit_error)?;
        let note = Self::committed_note(committed.unit_of_work(), id)?;
        info!(note_id = %note.id, version = note.version, "note created");
        Ok(note)
    }

    async fn update(&self, request: UpdateNoteRequest) -> Result<Note, Error> {
        Self::validate_title(&request.title)?;

        let UpdateNoteRequest {
            id,
            title,
            body,
            expected_version,
        } = request;
        let mut unit_of_work = UnitOfWork::new();
        let note = unit_of_work
            .load::<Note, S>(self.interceptor.store(), &id.to_string())
            .await
            .map_err(Self::map_load_error)?
            .ok_or_else(|| Self::not_found(id))?;

        if note.version != expected_version {
            return Err(Self::version_conflict(expected_version, note.version));
        }
        note.title = title;
        note.body = body;

        let committed = self
            .interceptor
            .commit(unit_of_work)
            .await
            .map_err(Self::map_commit_error)?;
        let note = Self::committed_note(committed.unit_of_work(), id)?;
        info!(note_id = %note.id, version = note.version, "note updated");
        Ok(note)
    }
}

#[async_trait]
impl<S> NoteQuery for NoteService<S>
where
    S: CommitStore + ?Sized,
{
    async fn fetch(&self, id: Uuid) -> Result<Note, Error> {
        let mut unit_of_work = UnitOfWork::new();
        unit_of_work
            .load::<Note, S>(self.interceptor.store(), &id.to_string())
            .await
            .map_err(Self::map_load_error)?
            .map(|note| note.clone())
            .ok_or_else(|| Self::not_found(id))
    }
}

#[cfg(test)]
mod tests;
