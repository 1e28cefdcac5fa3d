//! Domain primitives, the change tracker, and the commit interceptor.
//!
//! Purpose: keep persistence rules (audit timestamps, optimistic concurrency
//! versions) in one transport-agnostic place. Adapters reach the domain only
//! through the traits in [`ports`].
//!
//! Public surface:
//! - [`UnitOfWork`]: explicit change tracker scoped to one commit.
//! - [`CommitInterceptor`]: stamps audit fields and bumps versions before
//!   delegating to a [`ports::CommitStore`].
//! - [`Error`] / [`ErrorCode`]: transport-agnostic failure payload.
//! - [`Note`] / [`NoteService`]: the notes aggregate and its use cases.

pub mod commit_interceptor;
pub mod error;
pub mod note;
pub mod note_service;
pub mod ports;
pub mod unit_of_work;

pub use self::commit_interceptor::{CommitError, CommitInterceptor, Committed};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::note::Note;
pub use self::note_service::NoteService;
pub use self::unit_of_work::{
    Auditable, CREATED_AT_FIELD, ChangeSet, ChangeState, Entity, EntityKey, LoadError, Record,
    Row, StagedChange, TrackedEntry, TrackingError, UPDATED_AT_FIELD, UnitOfWork, VERSION_FIELD,
    Versioned,
};
