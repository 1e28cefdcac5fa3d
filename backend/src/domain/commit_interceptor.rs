//! Commit-time interceptor stamping audit fields and bumping versions.
//!
//! [`CommitInterceptor::commit`] runs immediately before a unit of work is
//! handed to the [`CommitStore`]. It reads the injected clock once and applies
//! two passes over the tracked entities:
//!
//! | State    | `created_at`                  | `updated_at` | `version`        |
//! |----------|-------------------------------|--------------|------------------|
//! | Inserted | now, written                  | now, written | 1, written       |
//! | Updated  | original value, not written   | now, written | original + 1     |
//! | other    | untouched                     | untouched    | untouched        |
//!
//! Updated and deleted versioned entities keep their original version as the
//! store's write precondition, so concurrent writers are detected by the store
//! rather than here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{debug, warn};

use crate::domain::ports::{CommitStore, CommitStoreError};
use crate::domain::{
    CREATED_AT_FIELD, ChangeState, TrackingError, UPDATED_AT_FIELD, UnitOfWork, VERSION_FIELD,
};

/// Failures surfaced by [`CommitInterceptor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// The blocking entry point was called; only the awaitable commit is
    /// supported.
    #[error("synchronous commit is not supported; await CommitInterceptor::commit instead")]
    SynchronousCommitUnsupported,
    /// The unit of work could not be turned into a change set.
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    /// The store rejected the commit. The store error is passed through
    /// untouched.
    #[error(transparent)]
    Store(#[from] CommitStoreError),
}

impl CommitError {
    /// Whether the commit lost an optimistic concurrency race.
    ///
    /// # Examples
    /// ```
    /// use service_backend::domain::CommitError;
    /// use service_backend::domain::ports::CommitStoreError;
    ///
    /// let err = CommitError::from(CommitStoreError::version_mismatch("note/1", 3_u32, 4_u32));
    /// assert!(err.is_conflict());
    /// assert!(!CommitError::SynchronousCommitUnsupported.is_conflict());
    /// ```
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_conflict())
    }
}

/// Outcome of a successful commit.
#[derive(Debug)]
pub struct Committed {
    affected: usize,
    unit_of_work: UnitOfWork,
}

impl Committed {
    /// Number of entities the store wrote.
    pub fn affected(&self) -> usize {
        self.affected
    }

    /// The unit of work with every change accepted.
    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    /// Take back the unit of work to stage further changes.
    pub fn into_unit_of_work(self) -> UnitOfWork {
        self.unit_of_work
    }
}

/// Applies audit and version rules, then delegates to the store.
///
/// The interceptor holds no per-commit state and can be shared freely across
/// tasks.
pub struct CommitInterceptor<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for CommitInterceptor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: ?Sized> CommitInterceptor<S> {
    /// Create an interceptor writing to `store` and stamping instants read
    /// from `clock`.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use mockable::DefaultClock;
    /// use service_backend::domain::CommitInterceptor;
    /// use service_backend::outbound::memory_store::InMemoryCommitStore;
    ///
    /// let interceptor =
    ///     CommitInterceptor::new(Arc::new(InMemoryCommitStore::new()), Arc::new(DefaultClock));
    /// # let _ = interceptor;
    /// ```
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Store the interceptor delegates to.
    pub fn store(&self) -> &S {
        self.store.as_ref()
    }
}

impl<S> CommitInterceptor<S>
where
    S: CommitStore + ?Sized,
{
    /// Stamp, version, and persist every change in `unit_of_work`.
    ///
    /// The unit of work is consumed. On success it is handed back inside
    /// [`Committed`] with every entry accepted; on failure, or when the
    /// returned future is dropped, it is discarded together with the
    /// in-memory field changes.
    ///
    /// # Errors
    ///
    /// Store failures are returned as [`CommitError::Store`] without
    /// modification. No retry is attempted.
    pub async fn commit(&self, mut unit_of_work: UnitOfWork) -> Result<Committed, CommitError> {
        unit_of_work.detect_changes()?;

        let now = self.clock.utc();
        let stamped = stamp_audit_fields(&mut unit_of_work, now);
        let versioned = bump_versions(&mut unit_of_work);
        let changes = unit_of_work.change_set()?;

        debug!(
            commit_instant = %now,
            staged = changes.len(),
            pending_writes = changes.pending_writes(),
            stamped,
            versioned,
            "committing unit of work"
        );

        let affected = self.store.commit(&changes).await.map_err(|error| {
            if error.is_conflict() {
                warn!(error = %error, kind = error.kind(), "commit rejected by concurrency check");
            } else {
                debug!(error = %error, kind = error.kind(), "commit failed");
            }
            CommitError::Store(error)
        })?;

        unit_of_work.accept_all_changes();
        Ok(Committed {
            affected,
            unit_of_work,
        })
    }

    /// Blocking commit entry point. Always fails without touching the unit
    /// of work or the store.
    ///
    /// # Examples
    /// ```
    /// # use std::sync::Arc;
    /// # use mockable::DefaultClock;
    /// use service_backend::domain::{CommitError, CommitInterceptor, UnitOfWork};
    /// use service_backend::domain::ports::FixtureCommitStore;
    ///
    /// let interceptor = CommitInterceptor::new(Arc::new(FixtureCommitStore), Arc::new(DefaultClock));
    /// let result = interceptor.commit_blocking(&UnitOfWork::new());
    /// assert_eq!(result, Err(CommitError::SynchronousCommitUnsupported));
    /// ```
    pub fn commit_blocking(&self, _unit_of_work: &UnitOfWork) -> Result<usize, CommitError> {
        Err(CommitError::SynchronousCommitUnsupported)
    }
}

/// Audit pass. Returns the number of stamped entities.
fn stamp_audit_fields(unit_of_work: &mut UnitOfWork, now: DateTime<Utc>) -> usize {
    let mut stamped = 0;
    for entry in unit_of_work.entries_mut() {
        let state = entry.state();
        if !matches!(state, ChangeState::Inserted | ChangeState::Updated) {
            continue;
        }
        let original_created_at = entry
            .original()
            .and_then(|original| original.as_auditable())
            .map(|auditable| auditable.created_at());
        let Some(auditable) = entry.entity_mut().as_auditable_mut() else {
            continue;
        };

        if state == ChangeState::Inserted {
            auditable.set_created_at(now);
            auditable.set_updated_at(now);
            entry.set_modified(CREATED_AT_FIELD, true);
        } else {
            // created_at never changes once persisted.
            if let Some(created_at) = original_created_at {
                auditable.set_created_at(created_at);
            }
            auditable.set_updated_at(now);
            entry.set_modified(CREATED_AT_FIELD, false);
        }
        entry.set_modified(UPDATED_AT_FIELD, true);
        stamped += 1;
    }
    stamped
}

/// Version pass. Returns the number of versioned entities.
fn bump_versions(unit_of_work: &mut UnitOfWork) -> usize {
    let mut versioned = 0;
    for entry in unit_of_work.entries_mut() {
        let state = entry.state();
        let original_version = entry
            .original()
            .and_then(|original| original.as_versioned())
            .map(|original| original.version());
        let Some(token) = entry.entity_mut().as_versioned_mut() else {
            continue;
        };

        match state {
            ChangeState::Inserted => token.set_version(1),
            ChangeState::Updated => {
                let base = original_version.unwrap_or_else(|| token.version());
                token.set_version(base.wrapping_add(1));
            }
            ChangeState::Unchanged | ChangeState::Deleted => continue,
        }
        entry.set_modified(VERSION_FIELD, true);
        versioned += 1;
    }
    versioned
}
