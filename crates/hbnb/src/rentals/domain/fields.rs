use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::meta::EntityId;
use super::ModelError;

/// Field-typed payload handed over by the transport layer.
pub type Attributes = Map<String, Value>;

/// Maximum accepted length of an email address.
pub const EMAIL_MAX: usize = 120;

/// Shape and bounds a field value must satisfy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text { max_len: Option<usize> },
    OptionalText { max_len: Option<usize> },
    Email,
    Real { min: f64, max: Option<f64> },
    Integer { min: i64, max: i64 },
    Flag,
    IdSet,
}

/// Validated value ready to be assigned to an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    Real(f64),
    Integer(i64),
    Flag(bool),
    Ids(BTreeSet<EntityId>),
}

/// One row of an entity's validation table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub on_create: bool,
}

impl FieldRule {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            on_create: true,
        }
    }

    /// Rule that only applies to updates; constructors take the value another way.
    pub const fn update_only(self) -> Self {
        Self {
            on_create: false,
            ..self
        }
    }

    /// Read the field out of a payload. Absence is treated like an explicit `null`.
    pub fn read(&self, attributes: &Attributes) -> Result<FieldValue, ModelError> {
        self.validate(attributes.get(self.name).unwrap_or(&Value::Null))
    }

    pub fn validate(&self, raw: &Value) -> Result<FieldValue, ModelError> {
        match self.kind {
            FieldKind::Text { max_len } => match raw {
                Value::Null => Err(self.invalid("is required")),
                Value::String(text) => {
                    self.check_text(text, max_len)?;
                    Ok(FieldValue::Text(text.clone()))
                }
                _ => Err(self.mismatch("string")),
            },
            FieldKind::OptionalText { max_len } => match raw {
                Value::Null => Ok(FieldValue::OptionalText(None)),
                Value::String(text) if text.trim().is_empty() => {
                    Ok(FieldValue::OptionalText(None))
                }
                Value::String(text) => {
                    self.check_text(text, max_len)?;
                    Ok(FieldValue::OptionalText(Some(text.clone())))
                }
                _ => Err(self.mismatch("string")),
            },
            FieldKind::Email => match raw {
                Value::Null => Err(self.invalid("is required")),
                Value::String(text) if text.trim().is_empty() => {
                    Err(self.invalid("must not be empty"))
                }
                Value::String(text) => normalize_email(text)
                    .map(FieldValue::Text)
                    .ok_or_else(|| self.invalid("is not a valid email address")),
                _ => Err(self.mismatch("string")),
            },
            FieldKind::Real { min, max } => match raw {
                Value::Null => Err(self.invalid("is required")),
                Value::Number(number) => {
                    let value = number
                        .as_f64()
                        .filter(|value| value.is_finite())
                        .ok_or_else(|| self.mismatch("real number"))?;
                    if value < min {
                        return Err(self.out_of_range(min, max));
                    }
                    if let Some(max) = max {
                        if value > max {
                            return Err(self.out_of_range(min, Some(max)));
                        }
                    }
                    Ok(FieldValue::Real(value))
                }
                _ => Err(self.mismatch("real number")),
            },
            FieldKind::Integer { min, max } => match raw {
                Value::Null => Err(self.invalid("is required")),
                Value::Number(number) if number.is_f64() => Err(self.mismatch("integer")),
                Value::Number(number) => match number.as_i64() {
                    Some(value) if (min..=max).contains(&value) => Ok(FieldValue::Integer(value)),
                    _ => Err(self.invalid(format!("must be between {min} and {max}"))),
                },
                _ => Err(self.mismatch("integer")),
            },
            FieldKind::Flag => match raw {
                Value::Bool(flag) => Ok(FieldValue::Flag(*flag)),
                Value::Null => Err(self.invalid("is required")),
                _ => Err(self.mismatch("boolean")),
            },
            FieldKind::IdSet => match raw {
                Value::Null => Ok(FieldValue::Ids(BTreeSet::new())),
                Value::Array(items) => {
                    let mut ids = BTreeSet::new();
                    for item in items {
                        let raw_id = item
                            .as_str()
                            .ok_or_else(|| self.mismatch("list of identifiers"))?;
                        let id = raw_id.parse::<EntityId>().map_err(|_| {
                            self.invalid(format!("contains an invalid identifier '{raw_id}'"))
                        })?;
                        ids.insert(id);
                    }
                    Ok(FieldValue::Ids(ids))
                }
                _ => Err(self.mismatch("list of identifiers")),
            },
        }
    }

    fn check_text(&self, text: &str, max_len: Option<usize>) -> Result<(), ModelError> {
        if text.trim().is_empty() {
            return Err(self.invalid("must not be empty"));
        }
        if let Some(max) = max_len {
            if text.chars().count() > max {
                return Err(self.invalid(format!("must be at most {max} characters")));
            }
        }
        Ok(())
    }

    fn out_of_range(&self, min: f64, max: Option<f64>) -> ModelError {
        match max {
            Some(max) => self.invalid(format!("must be between {min} and {max}")),
            None => self.invalid(format!("must be at least {min}")),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ModelError {
        ModelError::Validation {
            field: self.name,
            reason: reason.into(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ModelError {
        ModelError::TypeMismatch {
            field: self.name,
            expected,
        }
    }
}

fn local_part_regex() -> &'static Regex {
    static LOCAL_PART: OnceLock<Regex> = OnceLock::new();
    LOCAL_PART.get_or_init(|| {
        Regex::new(r"^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
            .unwrap_or_else(|error| panic!("email local-part regex failed to compile: {error}"))
    })
}

fn domain_regex() -> &'static Regex {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN.get_or_init(|| {
        let label = "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?";
        Regex::new(&format!(r"^{label}(\.{label})*\.[a-z]{{2,63}}$"))
            .unwrap_or_else(|error| panic!("email domain regex failed to compile: {error}"))
    })
}

/// Canonical form of an email address, or `None` when it is not syntactically valid.
///
/// Surrounding whitespace is dropped and the whole address is lowercased, so two
/// addresses differing only in case collide on uniqueness checks.
pub fn normalize_email(raw: &str) -> Option<String> {
    let candidate = raw.trim().to_lowercase();
    if candidate.chars().count() > EMAIL_MAX {
        return None;
    }

    let (local, domain) = candidate.rsplit_once('@')?;
    if local.is_empty() || local.len() > 64 {
        return None;
    }
    if !local_part_regex().is_match(local) || !domain_regex().is_match(domain) {
        return None;
    }

    Some(candidate)
}
