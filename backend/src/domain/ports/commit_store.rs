//! Port for the persistence commit operation.
//!
//! The [`CommitStore`] trait is the downstream edge of the commit
//! interceptor: it receives the fully stamped [`ChangeSet`] and writes it
//! atomically. Adapters enforce optimistic concurrency by rejecting any
//! update or delete whose `expected_version` no longer matches the stored
//! row.

use async_trait::async_trait;

use crate::domain::{ChangeSet, EntityKey, Row};

use super::define_port_error;

define_port_error! {
    /// Errors raised by commit store adapters.
    pub enum CommitStoreError {
        /// Store connection could not be established or was lost.
        Connection { message: String } =>
            "commit store connection failed: {message}",
        /// A write violated a store constraint such as a duplicate key.
        Constraint { message: String } =>
            "commit store constraint violated: {message}",
        /// Optimistic concurrency check failed.
        VersionMismatch { entity: String, expected: u32, actual: u32 } =>
            "version mismatch on {entity}: expected {expected}, found {actual}",
        /// The row targeted by an update or delete no longer exists.
        Missing { entity: String } =>
            "{entity} no longer exists",
    }
}

impl CommitStoreError {
    /// Whether another writer changed the row since it was loaded. Callers
    /// can reload and retry on conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. } | Self::Missing { .. })
    }
}

/// Port for reading rows and committing change sets.
///
/// # Atomicity
///
/// `commit` must apply either every staged write or none of them. The
/// returned count is the number of written entities.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Fetch the stored row for an entity, if present.
    async fn find(&self, key: &EntityKey) -> Result<Option<Row>, CommitStoreError>;

    /// Persist a change set.
    ///
    /// # Errors
    ///
    /// - [`CommitStoreError::VersionMismatch`] when a version precondition
    ///   fails.
    /// - [`CommitStoreError::Missing`] when an updated or deleted row is gone.
    /// - [`CommitStoreError::Constraint`] when an insert collides with an
    ///   existing row.
    async fn commit(&self, changes: &ChangeSet) -> Result<usize, CommitStoreError>;
}

/// Fixture implementation for tests where persistence is not under test.
///
/// Lookups find nothing and every commit succeeds, reporting one write per
/// pending change.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCommitStore;

#[async_trait]
impl CommitStore for FixtureCommitStore {
    async fn find(&self, _key: &EntityKey) -> Result<Option<Row>, CommitStoreError> {
        Ok(None)
    }

    async fn commit(&self, changes: &ChangeSet) -> Result<usize, CommitStoreError> {
        Ok(changes.pending_writes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeState, StagedChange};
    use rstest::rstest;

    #[tokio::test]
    async fn fixture_store_lookup_returns_none() {
        let store = FixtureCommitStore;
        let found = store
            .find(&EntityKey::new("note", "1"))
            .await
            .expect("fixture lookup should succeed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn fixture_store_counts_pending_writes() {
        let store = FixtureCommitStore;
        let staged = |id: &str, state| StagedChange {
            key: EntityKey::new("note", id),
            state,
            values: Row::new(),
            expected_version: None,
        };
        let changes = ChangeSet::new(vec![
            staged("1", ChangeState::Inserted),
            staged("2", ChangeState::Unchanged),
            staged("3", ChangeState::Deleted),
        ]);

        let affected = store.commit(&changes).await.expect("fixture commit");
        assert_eq!(affected, 2);
    }

    #[rstest]
    #[case(CommitStoreError::version_mismatch("note/1", 3_u32, 4_u32), true)]
    #[case(CommitStoreError::missing("note/1"), true)]
    #[case(CommitStoreError::constraint("duplicate key"), false)]
    #[case(CommitStoreError::connection("refused"), false)]
    fn conflicts_are_distinguishable(#[case] error: CommitStoreError, #[case] expected: bool) {
        assert_eq!(error.is_conflict(), expected);
    }

    #[rstest]
    fn version_mismatch_formats_expected_and_actual() {
        let message = CommitStoreError::version_mismatch("note/1", 3_u32, 4_u32).to_string();

        assert!(message.contains("note/1"));
        assert!(message.contains("expected 3"));
        assert!(message.contains("found 4"));
    }
}
