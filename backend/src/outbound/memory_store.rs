//! In-process `CommitStore` adapter.
//!
//! Rows live in a mutex-guarded map keyed by [`EntityKey`]. A commit first
//! validates every staged change against the current rows and only then
//! applies the writes, so a batch either lands completely or not at all.
//! Version preconditions are checked against the stored `version` field.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::ports::{CommitStore, CommitStoreError};
use crate::domain::{ChangeSet, ChangeState, EntityKey, Row, StagedChange, VERSION_FIELD};

/// Mutex-guarded row map implementing optimistic concurrency checks.
#[derive(Debug, Default)]
pub struct InMemoryCommitStore {
    rows: Mutex<HashMap<EntityKey, Row>>,
}

impl InMemoryCommitStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn len(&self) -> Result<usize, CommitStoreError> {
        Ok(self.lock()?.len())
    }

    /// Whether no rows are stored.
    pub fn is_empty(&self) -> Result<bool, CommitStoreError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<EntityKey, Row>>, CommitStoreError> {
        self.rows
            .lock()
            .map_err(|_| CommitStoreError::connection("row store lock poisoned"))
    }
}

fn stored_version(row: &Row) -> u32 {
    row.get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .and_then(|version| u32::try_from(version).ok())
        .unwrap_or_default()
}

fn validate(rows: &HashMap<EntityKey, Row>, change: &StagedChange) -> Result<(), CommitStoreError> {
    match change.state {
        ChangeState::Unchanged => Ok(()),
        ChangeState::Inserted => {
            if rows.contains_key(&change.key) {
                return Err(CommitStoreError::constraint(format!(
                    "{} already exists",
                    change.key
                )));
            }
            Ok(())
        }
        ChangeState::Updated | ChangeState::Deleted => {
            let row = rows
                .get(&change.key)
                .ok_or_else(|| CommitStoreError::missing(change.key.to_string()))?;
            match change.expected_version {
                Some(expected) if stored_version(row) != expected => {
                    Err(CommitStoreError::version_mismatch(
                        change.key.to_string(),
                        expected,
                        stored_version(row),
                    ))
                }
                _ => Ok(()),
            }
        }
    }
}

fn apply(rows: &mut HashMap<EntityKey, Row>, change: &StagedChange) {
    match change.state {
        ChangeState::Unchanged => {}
        ChangeState::Inserted => {
            rows.insert(change.key.clone(), change.values.clone());
        }
        ChangeState::Updated => {
            if let Some(row) = rows.get_mut(&change.key) {
                for (field, value) in &change.values {
                    if value.is_null() {
                        row.remove(field);
                    } else {
                        row.insert(field.clone(), value.clone());
                    }
                }
            }
        }
        ChangeState::Deleted => {
            rows.remove(&change.key);
        }
    }
}

#[async_trait]
impl CommitStore for InMemoryCommitStore {
    async fn find(&self, key: &EntityKey) -> Result<Option<Row>, CommitStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn commit(&self, changes: &ChangeSet) -> Result<usize, CommitStoreError> {
        let mut rows = self.lock()?;
        for change in changes.iter() {
            validate(&rows, change)?;
        }
        for change in changes.iter() {
            apply(&mut rows, change);
        }
        let written = changes.pending_writes();
        debug!(written, stored = rows.len(), "in-memory commit applied");
        Ok(written)
    }
}
