use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{Attributes, FieldKind, FieldRule, FieldValue};
use super::meta::{EntityId, EntityKind, EntityMeta};
use super::{populate, Entity, ModelError, UniqueKey};

/// Maximum length of first and last names.
pub const NAME_MAX: usize = 50;

const EMAIL: FieldRule = FieldRule::new("email", FieldKind::Email);

const FIELDS: &[FieldRule] = &[
    FieldRule::new("first_name", FieldKind::Text { max_len: Some(NAME_MAX) }),
    FieldRule::new("last_name", FieldKind::Text { max_len: Some(NAME_MAX) }),
    EMAIL,
    FieldRule::new("is_admin", FieldKind::Flag).update_only(),
    FieldRule::new("password_hash", FieldKind::Text { max_len: None }).update_only(),
];

/// Opaque output of the credential hasher. Never rendered in debug output or views.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialHash(<redacted>)")
    }
}

/// Registered account that owns places and authors reviews.
///
/// Not `Serialize`; callers render [`UserView`] and storage writes [`UserRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    meta: EntityMeta,
    first_name: String,
    last_name: String,
    email: String,
    is_admin: bool,
    password_hash: CredentialHash,
}

/// Stored form of a user, the only serialized shape that carries the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(flatten)]
    meta: EntityMeta,
    first_name: String,
    last_name: String,
    email: String,
    is_admin: bool,
    password_hash: CredentialHash,
}

impl User {
    /// Build a user from `first_name`, `last_name`, and `email` attributes.
    pub fn new(
        attributes: &Attributes,
        credential: CredentialHash,
        is_admin: bool,
    ) -> Result<Self, ModelError> {
        let mut user = Self {
            meta: EntityMeta::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            is_admin,
            password_hash: credential,
        };
        populate(&mut user, attributes)?;
        Ok(user)
    }

    /// Validate and normalize an email attribute without building a user.
    pub fn email_from(attributes: &Attributes) -> Result<String, ModelError> {
        match EMAIL.read(attributes)? {
            FieldValue::Text(email) => Ok(email),
            _ => Err(ModelError::TypeMismatch {
                field: "email",
                expected: "string",
            }),
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub(crate) fn credential(&self) -> &CredentialHash {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.meta.updated_at()
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
            created_at: self.created_at(),
            updated_at: self.updated_at(),
        }
    }

    pub fn owner_summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.id(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;
    const FIELDS: &'static [FieldRule] = FIELDS;
    const FIXED: &'static [&'static str] = &[];

    type Record = UserRecord;

    fn to_record(&self) -> UserRecord {
        UserRecord {
            meta: self.meta.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
            password_hash: self.password_hash.clone(),
        }
    }

    fn from_record(record: UserRecord) -> Self {
        Self {
            meta: record.meta,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            is_admin: record.is_admin,
            password_hash: record.password_hash,
        }
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn assign(&mut self, field: &'static str, value: FieldValue) {
        match (field, value) {
            ("first_name", FieldValue::Text(name)) => self.first_name = name,
            ("last_name", FieldValue::Text(name)) => self.last_name = name,
            ("email", FieldValue::Text(email)) => self.email = email,
            ("is_admin", FieldValue::Flag(flag)) => self.is_admin = flag,
            ("password_hash", FieldValue::Text(encoded)) => {
                self.password_hash = CredentialHash(encoded)
            }
            _ => {}
        }
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id().to_string())),
            "first_name" => Some(Value::String(self.first_name.clone())),
            "last_name" => Some(Value::String(self.last_name.clone())),
            "email" => Some(Value::String(self.email.clone())),
            "is_admin" => Some(Value::Bool(self.is_admin)),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("email", self.email.clone())]
    }
}

/// Public projection of a user; carries no credential material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner details embedded in place views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerSummary {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}
