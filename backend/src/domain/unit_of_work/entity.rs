//! Tracked entity contracts and the audit/version capabilities.
//!
//! Entity types implement [`Record`]. A blanket implementation erases them to
//! [`Entity`] trait objects so a single [`UnitOfWork`](super::UnitOfWork) can
//! track heterogeneous types side by side. Capabilities are discovered by
//! asking the trait object for an [`Auditable`] or [`Versioned`] view rather
//! than through a type hierarchy.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Column values of an entity keyed by field name.
pub type Row = Map<String, Value>;

/// Row field holding the creation timestamp of an [`Auditable`] entity.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Row field holding the last-update timestamp of an [`Auditable`] entity.
pub const UPDATED_AT_FIELD: &str = "updated_at";
/// Row field holding the concurrency token of a [`Versioned`] entity.
pub const VERSION_FIELD: &str = "version";

/// Identity of a tracked entity: its type tag plus its primary key.
///
/// # Examples
/// ```
/// use service_backend::domain::EntityKey;
///
/// let key = EntityKey::new("note", "42");
/// assert_eq!(key.to_string(), "note/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    entity_type: &'static str,
    id: String,
}

impl EntityKey {
    /// Build a key from a type tag and a primary key value.
    pub fn new(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    /// Type tag shared by every entity of the same record type.
    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    /// Primary key value.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// Creation and update timestamps maintained at commit time.
///
/// Implementors must serialise the timestamps under [`CREATED_AT_FIELD`] and
/// [`UPDATED_AT_FIELD`] so the write set computed from rows matches the
/// fields the commit interceptor flags.
pub trait Auditable {
    /// Instant the entity was first persisted.
    fn created_at(&self) -> DateTime<Utc>;
    /// Overwrite the creation instant.
    fn set_created_at(&mut self, at: DateTime<Utc>);
    /// Instant of the most recent persisted change.
    fn updated_at(&self) -> DateTime<Utc>;
    /// Overwrite the last-update instant.
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Optimistic concurrency token maintained at commit time.
///
/// Implementors must serialise the token under [`VERSION_FIELD`].
pub trait Versioned {
    /// Current version number; 1 after the first insert.
    fn version(&self) -> u32;
    /// Overwrite the version number.
    fn set_version(&mut self, version: u32);
}

/// Typed contract implemented by persistable entity types.
///
/// Override the capability accessors to opt into audit stamping or version
/// maintenance:
///
/// ```
/// use chrono::{DateTime, Utc};
/// use serde::{Deserialize, Serialize};
/// use service_backend::domain::{Record, Versioned};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Counter {
///     id: u64,
///     version: u32,
/// }
///
/// impl Versioned for Counter {
///     fn version(&self) -> u32 {
///         self.version
///     }
///     fn set_version(&mut self, version: u32) {
///         self.version = version;
///     }
/// }
///
/// impl Record for Counter {
///     const ENTITY_TYPE: &'static str = "counter";
///
///     fn id(&self) -> String {
///         self.id.to_string()
///     }
///
///     fn versioned(&self) -> Option<&dyn Versioned> {
///         Some(self)
///     }
///
///     fn versioned_mut(&mut self) -> Option<&mut dyn Versioned> {
///         Some(self)
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Type tag used in [`EntityKey`]s and by stores to select a table.
    const ENTITY_TYPE: &'static str;

    /// Primary key value, stable for the lifetime of the entity.
    fn id(&self) -> String;

    /// Audit view of the entity, when it carries timestamps.
    fn auditable(&self) -> Option<&dyn Auditable> {
        None
    }

    /// Mutable audit view of the entity.
    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }

    /// Version view of the entity, when it carries a concurrency token.
    fn versioned(&self) -> Option<&dyn Versioned> {
        None
    }

    /// Mutable version view of the entity.
    fn versioned_mut(&mut self) -> Option<&mut dyn Versioned> {
        None
    }
}

/// Type-erased view of a [`Record`] held by the unit of work.
pub trait Entity: fmt::Debug + Send + Sync {
    /// Identity used to track and persist the entity.
    fn key(&self) -> EntityKey;

    /// Serialise the entity into its row representation.
    fn to_row(&self) -> Result<Row, serde_json::Error>;

    /// Clone into a fresh trait object, used for snapshots.
    fn boxed_clone(&self) -> Box<dyn Entity>;

    /// Downcasting hook for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcasting hook for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Audit capability, if implemented.
    fn as_auditable(&self) -> Option<&dyn Auditable>;

    /// Mutable audit capability, if implemented.
    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable>;

    /// Version capability, if implemented.
    fn as_versioned(&self) -> Option<&dyn Versioned>;

    /// Mutable version capability, if implemented.
    fn as_versioned_mut(&mut self) -> Option<&mut dyn Versioned>;
}

impl<T: Record> Entity for T {
    fn key(&self) -> EntityKey {
        EntityKey::new(T::ENTITY_TYPE, self.id())
    }

    fn to_row(&self) -> Result<Row, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "{} must serialise to an object, got {other}",
                T::ENTITY_TYPE
            ))),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        self.auditable()
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        self.auditable_mut()
    }

    fn as_versioned(&self) -> Option<&dyn Versioned> {
        self.versioned()
    }

    fn as_versioned_mut(&mut self) -> Option<&mut dyn Versioned> {
        self.versioned_mut()
    }
}
