//! Explicit change tracker scoped to a single commit.
//!
//! A [`UnitOfWork`] records every entity participating in a pending commit
//! together with its [`ChangeState`], a snapshot of the values it had when it
//! was attached, and the set of fields flagged as modified. The commit
//! interceptor consumes the unit of work, adjusts audit and version fields,
//! and hands the resulting [`ChangeSet`] to the store.
//!
//! The tracker is a plain value owned by the caller. Nothing is shared
//! between units of work, so concurrent commits never contend on it.

mod change_set;
mod entity;

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use crate::domain::ports::{CommitStore, CommitStoreError};

pub use change_set::{ChangeSet, StagedChange};
pub use entity::{
    Auditable, CREATED_AT_FIELD, Entity, EntityKey, Record, Row, UPDATED_AT_FIELD, VERSION_FIELD,
    Versioned,
};

/// Lifecycle state of a tracked entity within one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeState {
    /// Attached and not modified since its snapshot was taken.
    Unchanged,
    /// New entity that does not exist in the store yet.
    Inserted,
    /// Existing entity with at least one modified field.
    Updated,
    /// Existing entity scheduled for removal.
    Deleted,
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unchanged => "unchanged",
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// Errors raised while recording or inspecting changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    /// An entity with the same key is already tracked.
    #[error("{key} is already tracked by this unit of work")]
    AlreadyTracked { key: EntityKey },
    /// No entity with the given key is tracked.
    #[error("{key} is not tracked by this unit of work")]
    NotTracked { key: EntityKey },
    /// The entity could not be converted to or from its row representation.
    #[error("failed to map {key} to a row: {message}")]
    RowMapping { key: EntityKey, message: String },
}

/// Errors raised while loading an entity into a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The store failed to read the row.
    #[error(transparent)]
    Store(#[from] CommitStoreError),
    /// The row could not be tracked.
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// One entity tracked by a [`UnitOfWork`].
#[derive(Debug)]
pub struct TrackedEntry {
    state: ChangeState,
    current: Box<dyn Entity>,
    original: Option<Box<dyn Entity>>,
    modified: BTreeSet<String>,
}

impl TrackedEntry {
    fn new(state: ChangeState, current: Box<dyn Entity>, original: Option<Box<dyn Entity>>) -> Self {
        Self {
            state,
            current,
            original,
            modified: BTreeSet::new(),
        }
    }

    /// Identity of the tracked entity.
    pub fn key(&self) -> EntityKey {
        self.current.key()
    }

    /// Current change state.
    pub fn state(&self) -> ChangeState {
        self.state
    }

    /// Current (pending) values.
    pub fn entity(&self) -> &dyn Entity {
        self.current.as_ref()
    }

    /// Mutable access to the current values.
    pub fn entity_mut(&mut self) -> &mut dyn Entity {
        self.current.as_mut()
    }

    /// Values the entity had when it was attached; `None` for inserts.
    pub fn original(&self) -> Option<&dyn Entity> {
        self.original.as_deref()
    }

    /// Whether `field` belongs to the write set.
    pub fn is_modified(&self, field: &str) -> bool {
        self.modified.contains(field)
    }

    /// Include or exclude `field` from the write set.
    pub fn set_modified(&mut self, field: &str, modified: bool) {
        if modified {
            self.modified.insert(field.to_owned());
        } else {
            self.modified.remove(field);
        }
    }

    /// Fields currently flagged as modified.
    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// Current value of a named field.
    pub fn current_value(&self, field: &str) -> Result<Option<Value>, TrackingError> {
        let row = self.current_row()?;
        Ok(row.get(field).cloned())
    }

    /// Original value of a named field; `None` when there is no snapshot or
    /// the field is absent.
    pub fn original_value(&self, field: &str) -> Result<Option<Value>, TrackingError> {
        match self.original.as_deref() {
            Some(original) => {
                let row = original.to_row().map_err(|err| self.row_error(&err))?;
                Ok(row.get(field).cloned())
            }
            None => Ok(None),
        }
    }

    fn current_row(&self) -> Result<Row, TrackingError> {
        self.current.to_row().map_err(|err| self.row_error(&err))
    }

    fn row_error(&self, err: &serde_json::Error) -> TrackingError {
        TrackingError::RowMapping {
            key: self.key(),
            message: err.to_string(),
        }
    }

    /// Flag every field that differs from the snapshot, including fields the
    /// current row no longer serialises. Unchanged entries with differences
    /// become Updated.
    fn detect_changes(&mut self) -> Result<(), TrackingError> {
        if !matches!(self.state, ChangeState::Unchanged | ChangeState::Updated) {
            return Ok(());
        }
        let Some(original) = self.original.as_deref() else {
            return Ok(());
        };
        let before = original.to_row().map_err(|err| self.row_error(&err))?;
        let after = self.current_row()?;

        let changed: Vec<String> = after
            .keys()
            .chain(before.keys())
            .filter(|field| before.get(field.as_str()) != after.get(field.as_str()))
            .cloned()
            .collect();
        if changed.is_empty() {
            return Ok(());
        }
        self.modified.extend(changed);
        self.state = ChangeState::Updated;
        Ok(())
    }

    fn accept(&mut self) {
        self.state = ChangeState::Unchanged;
        self.original = Some(self.current.boxed_clone());
        self.modified.clear();
    }
}

/// Change tracker for one commit.
///
/// # Examples
/// ```
/// # use serde::{Deserialize, Serialize};
/// use service_backend::domain::{ChangeState, Record, UnitOfWork};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Tag {
///     id: String,
/// }
///
/// impl Record for Tag {
///     const ENTITY_TYPE: &'static str = "tag";
///     fn id(&self) -> String {
///         self.id.clone()
///     }
/// }
///
/// let mut unit_of_work = UnitOfWork::new();
/// unit_of_work.add(Tag { id: "rust".into() }).expect("new key");
/// assert_eq!(unit_of_work.state_of::<Tag>("rust"), Some(ChangeState::Inserted));
/// ```
#[derive(Debug, Default)]
pub struct UnitOfWork {
    entries: Vec<TrackedEntry>,
}

impl UnitOfWork {
    /// Create an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track a new entity as [`ChangeState::Inserted`].
    pub fn add<T: Record>(&mut self, entity: T) -> Result<&mut T, TrackingError> {
        self.track(ChangeState::Inserted, entity, false)
    }

    /// Track an entity that already exists in the store as
    /// [`ChangeState::Unchanged`], snapshotting its values.
    pub fn attach<T: Record>(&mut self, entity: T) -> Result<&mut T, TrackingError> {
        self.track(ChangeState::Unchanged, entity, true)
    }

    /// Load an entity from the store and attach it.
    ///
    /// Returns the tracked instance when the key is already tracked and
    /// `Ok(None)` when the store has no such row.
    pub async fn load<T, S>(&mut self, store: &S, id: &str) -> Result<Option<&mut T>, LoadError>
    where
        T: Record,
        S: CommitStore + ?Sized,
    {
        let key = EntityKey::new(T::ENTITY_TYPE, id);
        if let Some(index) = self.position(&key) {
            return Ok(self.typed_mut_at::<T>(index));
        }

        let Some(row) = store.find(&key).await? else {
            return Ok(None);
        };
        let entity: T = serde_json::from_value(Value::Object(row)).map_err(|err| {
            TrackingError::RowMapping {
                key: key.clone(),
                message: err.to_string(),
            }
        })?;
        self.attach(entity).map(Some).map_err(LoadError::from)
    }

    /// Typed read access to a tracked entity.
    pub fn get<T: Record>(&self, id: &str) -> Option<&T> {
        let key = EntityKey::new(T::ENTITY_TYPE, id);
        self.entry(&key)?.entity().as_any().downcast_ref::<T>()
    }

    /// Typed write access to a tracked entity. Modifications are picked up by
    /// [`UnitOfWork::detect_changes`].
    pub fn get_mut<T: Record>(&mut self, id: &str) -> Option<&mut T> {
        let key = EntityKey::new(T::ENTITY_TYPE, id);
        let index = self.position(&key)?;
        self.typed_mut_at::<T>(index)
    }

    /// Change state of a tracked entity.
    pub fn state_of<T: Record>(&self, id: &str) -> Option<ChangeState> {
        let key = EntityKey::new(T::ENTITY_TYPE, id);
        self.entry(&key).map(TrackedEntry::state)
    }

    /// Tracked entry by key.
    pub fn entry(&self, key: &EntityKey) -> Option<&TrackedEntry> {
        self.entries.iter().find(|entry| entry.key() == *key)
    }

    /// Mutable tracked entry by key.
    pub fn entry_mut(&mut self, key: &EntityKey) -> Option<&mut TrackedEntry> {
        self.entries.iter_mut().find(|entry| entry.key() == *key)
    }

    /// Every tracked entry in tracking order.
    pub fn entries(&self) -> impl Iterator<Item = &TrackedEntry> {
        self.entries.iter()
    }

    /// Mutable iteration over every tracked entry.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut TrackedEntry> {
        self.entries.iter_mut()
    }

    /// Force an attached entity into [`ChangeState::Updated`] with every
    /// field flagged as modified. Inserted entities are left as they are.
    pub fn mark_updated(&mut self, key: &EntityKey) -> Result<(), TrackingError> {
        let entry = self
            .entry_mut(key)
            .ok_or_else(|| TrackingError::NotTracked { key: key.clone() })?;
        if entry.state == ChangeState::Inserted {
            return Ok(());
        }
        let row = entry.current_row()?;
        entry.modified.extend(row.keys().cloned());
        entry.state = ChangeState::Updated;
        Ok(())
    }

    /// Schedule a tracked entity for deletion. Removing an entity that was
    /// never persisted simply stops tracking it.
    pub fn remove(&mut self, key: &EntityKey) -> Result<(), TrackingError> {
        let index = self
            .position(key)
            .ok_or_else(|| TrackingError::NotTracked { key: key.clone() })?;
        let detach = self
            .entries
            .get(index)
            .is_some_and(|entry| entry.state == ChangeState::Inserted);
        if detach {
            self.entries.remove(index);
        } else if let Some(entry) = self.entries.get_mut(index) {
            entry.state = ChangeState::Deleted;
            entry.modified.clear();
        }
        Ok(())
    }

    /// Compare every attached entity with its snapshot and flag differences.
    pub fn detect_changes(&mut self) -> Result<(), TrackingError> {
        self.entries
            .iter_mut()
            .try_for_each(TrackedEntry::detect_changes)
    }

    /// Build the change set handed to the store.
    ///
    /// Inserted entities contribute their full row, updated entities only
    /// their modified fields, and deleted entities no values. Updated and
    /// deleted versioned entities carry their original version as the write
    /// precondition.
    pub fn change_set(&self) -> Result<ChangeSet, TrackingError> {
        self.entries
            .iter()
            .map(StagedChange::from_entry)
            .collect::<Result<Vec<_>, _>>()
            .map(ChangeSet::new)
    }

    /// Mark every pending change as persisted: deleted entities are detached,
    /// everything else becomes [`ChangeState::Unchanged`] with a fresh
    /// snapshot and an empty write set.
    pub fn accept_all_changes(&mut self) {
        self.entries
            .retain(|entry| entry.state != ChangeState::Deleted);
        self.entries.iter_mut().for_each(TrackedEntry::accept);
    }

    fn position(&self, key: &EntityKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == *key)
    }

    fn typed_mut_at<T: Record>(&mut self, index: usize) -> Option<&mut T> {
        self.entries
            .get_mut(index)?
            .current
            .as_any_mut()
            .downcast_mut::<T>()
    }

    fn track<T: Record>(
        &mut self,
        state: ChangeState,
        entity: T,
        snapshot: bool,
    ) -> Result<&mut T, TrackingError> {
        let key = Entity::key(&entity);
        if self.position(&key).is_some() {
            return Err(TrackingError::AlreadyTracked { key });
        }
        let original = snapshot.then(|| entity.boxed_clone());
        self.entries
            .push(TrackedEntry::new(state, Box::new(entity), original));
        let index = self.entries.len() - 1;
        self.typed_mut_at::<T>(index)
            .ok_or(TrackingError::NotTracked { key })
    }
}
