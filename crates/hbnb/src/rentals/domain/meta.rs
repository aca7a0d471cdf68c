use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier assigned once at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

/// The four persisted entity families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Place,
    Amenity,
    Review,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Place => "place",
            EntityKind::Amenity => "amenity",
            EntityKind::Review => "review",
        }
    }

    /// Plural name used for storage collections.
    pub const fn collection(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Place => "places",
            EntityKind::Amenity => "amenities",
            EntityKind::Review => "reviews",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity and timestamps embedded in every entity.
///
/// `updated_at` never falls behind `created_at` and moves strictly forward on every
/// [`EntityMeta::touch`], even when two mutations land within the clock's resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    id: EntityId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntityMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}
