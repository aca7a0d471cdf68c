use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{Attributes, FieldKind, FieldRule, FieldValue};
use super::meta::{EntityId, EntityKind, EntityMeta};
use super::{populate, Entity, ModelError, UniqueKey};

/// Maximum length of a review body.
pub const REVIEW_TEXT_MAX: usize = 500;

const FIELDS: &[FieldRule] = &[
    FieldRule::new(
        "text",
        FieldKind::Text {
            max_len: Some(REVIEW_TEXT_MAX),
        },
    ),
    FieldRule::new("rating", FieldKind::Integer { min: 1, max: 5 }),
];

/// A user's rating of a place they do not own. One per (author, place) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(flatten)]
    meta: EntityMeta,
    text: String,
    rating: u8,
    user_id: EntityId,
    place_id: EntityId,
}

impl Review {
    /// Build a review from `text` and `rating` attributes.
    pub fn new(
        attributes: &Attributes,
        user_id: EntityId,
        place_id: EntityId,
    ) -> Result<Self, ModelError> {
        let mut review = Self {
            meta: EntityMeta::new(),
            text: String::new(),
            rating: 0,
            user_id,
            place_id,
        };
        populate(&mut review, attributes)?;
        Ok(review)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn user_id(&self) -> EntityId {
        self.user_id
    }

    pub fn place_id(&self) -> EntityId {
        self.place_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.meta.updated_at()
    }
}

impl Entity for Review {
    const KIND: EntityKind = EntityKind::Review;
    const FIELDS: &'static [FieldRule] = FIELDS;
    const FIXED: &'static [&'static str] = &["user_id", "place_id", "user", "place"];

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
            ("text", FieldValue::Text(text)) => self.text = text,
            ("rating", FieldValue::Integer(rating)) => {
                if let Ok(rating) = u8::try_from(rating) {
                    self.rating = rating;
                }
            }
            _ => {}
        }
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id().to_string())),
            "text" => Some(Value::String(self.text.clone())),
            "rating" => Some(Value::from(self.rating)),
            "user_id" => Some(Value::String(self.user_id.to_string())),
            "place_id" => Some(Value::String(self.place_id.to_string())),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "author_place",
            format!("{}:{}", self.user_id, self.place_id),
        )]
    }
}
