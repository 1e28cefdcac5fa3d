//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod commit_store;
mod note_command;

#[cfg(test)]
pub use commit_store::MockCommitStore;
pub use commit_store::{CommitStore, CommitStoreError, FixtureCommitStore};
#[cfg(test)]
pub use note_command::{MockNoteCommand, MockNoteQuery};
pub use note_command::{CreateNoteRequest, NoteCommand, NoteQuery, UpdateNoteRequest};
