use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{Attributes, FieldKind, FieldRule, FieldValue};
use super::meta::{EntityKind, EntityMeta};
use super::{populate, Entity, ModelError, UniqueKey};

/// Maximum length of an amenity name.
pub const AMENITY_NAME_MAX: usize = 50;

const FIELDS: &[FieldRule] = &[FieldRule::new(
    "name",
    FieldKind::Text {
        max_len: Some(AMENITY_NAME_MAX),
    },
)];

/// Feature offered by places (e.g. "Wi-Fi", "Parking").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    #[serde(flatten)]
    meta: EntityMeta,
    name: String,
}

impl Amenity {
    pub fn new(attributes: &Attributes) -> Result<Self, ModelError> {
        let mut amenity = Self {
            meta: EntityMeta::new(),
            name: String::new(),
        };
        populate(&mut amenity, attributes)?;
        Ok(amenity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Amenity {
    const KIND: EntityKind = EntityKind::Amenity;
    const FIELDS: &'static [FieldRule] = FIELDS;
    const FIXED: &'static [&'static str] = &[];

    type Record = Self;

    fn to_record(&self) -> Self {
        self.clone()
    }

    fn from_record(record: Self) -> Self {
        record
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn assign(&mut self, field: &'static str, value: FieldValue) {
        if let ("name", FieldValue::Text(name)) = (field, value) {
            self.name = name;
        }
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id().to_string())),
            "name" => Some(Value::String(self.name.clone())),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("name", self.name.clone())]
    }
}
