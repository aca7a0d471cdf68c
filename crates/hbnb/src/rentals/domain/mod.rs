//! Entity model: users, places, amenities, and reviews.
//!
//! Every entity validates its fields through a per-type table of [`FieldRule`]s. Constructors
//! and [`apply_update`] both route through that table, so a rule is defined exactly once and an
//! entity is never stored half-valid.

mod amenity;
mod fields;
mod meta;
mod place;
mod review;
mod user;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use amenity::Amenity;
pub use fields::{normalize_email, Attributes, FieldKind, FieldRule, FieldValue, EMAIL_MAX};
pub use meta::{EntityId, EntityKind, EntityMeta};
pub use place::Place;
pub use review::Review;
pub use user::{CredentialHash, OwnerSummary, User, UserRecord, UserView};

/// Fields shared by every entity that no update may touch.
pub const SHARED_FIXED_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Failures raised while constructing or updating an entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{field} must be a {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },
    #[error("{field} cannot be changed after creation")]
    ImmutableField { field: String },
}

/// Storage-level uniqueness key (e.g. a user's email).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueKey {
    pub name: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.name, self.value)
    }
}

/// Behaviour shared by all persisted entity types.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;
    /// Validation table for the mutable fields.
    const FIELDS: &'static [FieldRule];
    /// Entity-specific fields fixed at creation, on top of [`SHARED_FIXED_FIELDS`].
    const FIXED: &'static [&'static str];

    /// Shape written to and read back from durable storage.
    type Record: Serialize + DeserializeOwned;

    fn to_record(&self) -> Self::Record;

    fn from_record(record: Self::Record) -> Self;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Store an already validated value. Only called with the variant its rule produces.
    fn assign(&mut self, field: &'static str, value: FieldValue);

    /// Current value of a named attribute, for attribute lookups.
    fn attribute(&self, name: &str) -> Option<Value>;

    fn unique_keys(&self) -> Vec<UniqueKey>;

    fn id(&self) -> EntityId {
        self.meta().id()
    }
}

pub fn is_fixed_field<E: Entity>(name: &str) -> bool {
    SHARED_FIXED_FIELDS.contains(&name) || E::FIXED.contains(&name)
}

/// Validate every creation-time field of `E` from a payload and assign them.
pub(crate) fn populate<E: Entity>(entity: &mut E, attributes: &Attributes) -> Result<(), ModelError> {
    let mut staged = Vec::with_capacity(E::FIELDS.len());
    for rule in E::FIELDS.iter().filter(|rule| rule.on_create) {
        staged.push((rule.name, rule.read(attributes)?));
    }
    for (name, value) in staged {
        entity.assign(name, value);
    }
    Ok(())
}

/// Merge a partial attribute map into an entity.
///
/// Each key naming a mutable field is re-validated before anything is assigned; unknown keys
/// are ignored; fixed keys fail with [`ModelError::ImmutableField`]. On success `updated_at`
/// always advances, even for an empty map.
pub fn apply_update<E: Entity>(entity: &mut E, changes: &Attributes) -> Result<(), ModelError> {
    let mut staged = Vec::with_capacity(changes.len());
    for (key, raw) in changes {
        if is_fixed_field::<E>(key) {
            return Err(ModelError::ImmutableField { field: key.clone() });
        }
        if let Some(rule) = E::FIELDS.iter().find(|rule| rule.name == key.as_str()) {
            staged.push((rule.name, rule.validate(raw)?));
        }
    }

    for (name, value) in staged {
        entity.assign(name, value);
    }
    entity.meta_mut().touch();
    Ok(())
}
