//! Note aggregate: an auditable, versioned record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Auditable, Record, Versioned};

/// Free-form note owned by the notes service.
///
/// Timestamps and version are maintained by the commit interceptor; values
/// set by callers before the first commit are overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Primary key.
    pub id: Uuid,
    /// Short heading.
    pub title: String,
    /// Free-form content.
    pub body: String,
    /// Instant of the first commit.
    pub created_at: DateTime<Utc>,
    /// Instant of the latest commit that changed the note.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token.
    pub version: u32,
}

impl Note {
    /// Create an unsaved note with a random identifier.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            version: 0,
        }
    }
}

impl Auditable for Note {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Versioned for Note {
    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

impl Record for Note {
    const ENTITY_TYPE: &'static str = "note";

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }

    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(self)
    }

    fn versioned(&self) -> Option<&dyn Versioned> {
        Some(self)
    }

    fn versioned_mut(&mut self) -> Option<&mut dyn Versioned> {
        Some(self)
    }
}
