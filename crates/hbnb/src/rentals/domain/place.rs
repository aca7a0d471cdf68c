use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{Attributes, FieldKind, FieldRule, FieldValue};
use super::meta::{EntityId, EntityKind, EntityMeta};
use super::{populate, Entity, ModelError, UniqueKey};

const FIELDS: &[FieldRule] = &[
    FieldRule::new("title", FieldKind::Text { max_len: None }),
    FieldRule::new("description", FieldKind::OptionalText { max_len: None }),
    FieldRule::new(
        "price",
        FieldKind::Real {
            min: 0.0,
            max: None,
        },
    ),
    FieldRule::new(
        "latitude",
        FieldKind::Real {
            min: -90.0,
            max: Some(90.0),
        },
    ),
    FieldRule::new(
        "longitude",
        FieldKind::Real {
            min: -180.0,
            max: Some(180.0),
        },
    ),
    FieldRule::new("amenities", FieldKind::IdSet).update_only(),
];

/// Listing owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    meta: EntityMeta,
    title: String,
    description: Option<String>,
    price: f64,
    latitude: f64,
    longitude: f64,
    owner_id: EntityId,
    #[serde(default)]
    amenities: BTreeSet<EntityId>,
}

impl Place {
    /// Build a place from `title`, `description`, `price`, `latitude`, and `longitude`
    /// attributes. Amenity references must already be resolved to identifiers.
    pub fn new(
        attributes: &Attributes,
        owner_id: EntityId,
        amenities: BTreeSet<EntityId>,
    ) -> Result<Self, ModelError> {
        let mut place = Self {
            meta: EntityMeta::new(),
            title: String::new(),
            description: None,
            price: 0.0,
            latitude: 0.0,
            longitude: 0.0,
            owner_id,
            amenities,
        };
        populate(&mut place, attributes)?;
        Ok(place)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn location(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// True when the place sits at exactly the given coordinates.
    pub fn is_at(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }

    pub fn owner_id(&self) -> EntityId {
        self.owner_id
    }

    pub fn amenities(&self) -> &BTreeSet<EntityId> {
        &self.amenities
    }

    pub fn has_amenity(&self, amenity_id: &EntityId) -> bool {
        self.amenities.contains(amenity_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.meta.updated_at()
    }
}

fn location_key(latitude: f64, longitude: f64) -> String {
    // Adding zero folds -0.0 into 0.0 so equal coordinates share one key.
    format!("{},{}", latitude + 0.0, longitude + 0.0)
}

impl Entity for Place {
    const KIND: EntityKind = EntityKind::Place;
    const FIELDS: &'static [FieldRule] = FIELDS;
    const FIXED: &'static [&'static str] = &["owner_id", "owner"];

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
        match (field, value) {
            ("title", FieldValue::Text(title)) => self.title = title,
            ("description", FieldValue::OptionalText(description)) => {
                self.description = description
            }
            ("price", FieldValue::Real(price)) => self.price = price,
            ("latitude", FieldValue::Real(latitude)) => self.latitude = latitude,
            ("longitude", FieldValue::Real(longitude)) => self.longitude = longitude,
            ("amenities", FieldValue::Ids(ids)) => self.amenities = ids,
            _ => {}
        }
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id().to_string())),
            "title" => Some(Value::String(self.title.clone())),
            "description" => Some(
                self.description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            "price" => serde_json::Number::from_f64(self.price).map(Value::Number),
            "latitude" => serde_json::Number::from_f64(self.latitude).map(Value::Number),
            "longitude" => serde_json::Number::from_f64(self.longitude).map(Value::Number),
            "owner_id" => Some(Value::String(self.owner_id.to_string())),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "location",
            location_key(self.latitude, self.longitude),
        )]
    }
}
