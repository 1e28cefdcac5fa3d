//! Store-facing description of a pending commit.

use serde_json::Value;

use super::{ChangeState, EntityKey, Row, TrackedEntry, TrackingError};

/// One tracked entity as presented to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChange {
    /// Identity of the entity.
    pub key: EntityKey,
    /// Change state reported by the tracker.
    pub state: ChangeState,
    /// Values to write: the full row for inserts, the write set for updates,
    /// nothing otherwise. A `null` in an update clears the stored field.
    pub values: Row,
    /// Version the stored row must still hold for the write to apply.
    pub expected_version: Option<u32>,
}

impl StagedChange {
    pub(super) fn from_entry(entry: &TrackedEntry) -> Result<Self, TrackingError> {
        let state = entry.state();
        let values = match state {
            ChangeState::Inserted => entry.current_row()?,
            ChangeState::Updated => {
                let mut row = entry.current_row()?;
                row.retain(|field, _| entry.is_modified(field));
                // Modified fields absent from the current row were cleared.
                for field in entry.modified_fields() {
                    if !row.contains_key(field) {
                        row.insert(field.to_owned(), Value::Null);
                    }
                }
                row
            }
            ChangeState::Unchanged | ChangeState::Deleted => Row::new(),
        };
        let expected_version = match state {
            ChangeState::Updated | ChangeState::Deleted => entry
                .original()
                .and_then(|original| original.as_versioned())
                .map(|versioned| versioned.version()),
            ChangeState::Inserted | ChangeState::Unchanged => None,
        };

        Ok(Self {
            key: entry.key(),
            state,
            values,
            expected_version,
        })
    }

    /// Whether the store has to write anything for this change.
    pub fn is_write(&self) -> bool {
        self.state != ChangeState::Unchanged
    }
}

/// Every staged entity of one commit, in tracking order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<StagedChange>,
}

impl ChangeSet {
    /// Wrap staged changes.
    pub fn new(changes: Vec<StagedChange>) -> Self {
        Self { changes }
    }

    /// Iterate over every staged entity, including unchanged ones.
    pub fn iter(&self) -> impl Iterator<Item = &StagedChange> {
        self.changes.iter()
    }

    /// Number of staged entities.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of entities the store has to write.
    pub fn pending_writes(&self) -> usize {
        self.changes.iter().filter(|change| change.is_write()).count()
    }

    /// Staged change for a key.
    pub fn get(&self, key: &EntityKey) -> Option<&StagedChange> {
        self.changes.iter().find(|change| change.key == *key)
    }
}
