use std::collections::BTreeMap;

use serde_json::Value;

use super::RepositoryError;
use crate::rentals::domain::{apply_update, Attributes, Entity, EntityId};

/// Rows of one entity type plus the uniqueness rules both repositories share.
#[derive(Debug, Clone)]
pub(super) struct EntityTable<E: Entity> {
    rows: BTreeMap<EntityId, E>,
}

impl<E: Entity> Default for EntityTable<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<E: Entity> EntityTable<E> {
    pub(super) fn from_rows(rows: Vec<E>) -> Result<Self, RepositoryError> {
        let mut table = Self::default();
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    pub(super) fn rows(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    pub(super) fn insert(&mut self, entity: E) -> Result<(), RepositoryError> {
        let id = entity.id();
        if self.rows.contains_key(&id) {
            return Err(RepositoryError::Conflict { kind: E::KIND, id });
        }
        self.check_unique(&entity)?;
        self.rows.insert(id, entity);
        Ok(())
    }

    pub(super) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(super) fn get(&self, id: &EntityId) -> Option<E> {
        self.rows.get(id).cloned()
    }

    pub(super) fn find(&self, name: &str, value: &Value) -> Option<E> {
        self.rows
            .values()
            .find(|row| {
                row.attribute(name)
                    .is_some_and(|stored| same_value(&stored, value))
            })
            .cloned()
    }

    pub(super) fn update(&mut self, id: &EntityId, changes: &Attributes) -> Result<E, RepositoryError> {
        let mut row = self.get(id).ok_or(RepositoryError::NotFound {
            kind: E::KIND,
            id: *id,
        })?;
        apply_update(&mut row, changes)?;
        self.check_unique(&row)?;
        self.rows.insert(*id, row.clone());
        Ok(row)
    }

    pub(super) fn remove(&mut self, id: &EntityId) -> bool {
        self.rows.remove(id).is_some()
    }

    /// Storage backstop for the facade's uniqueness checks.
    fn check_unique(&self, candidate: &E) -> Result<(), RepositoryError> {
        let keys = candidate.unique_keys();
        let clash = self
            .rows
            .values()
            .filter(|row| row.id() != candidate.id())
            .flat_map(|row| row.unique_keys())
            .find(|key| keys.contains(key));

        match clash {
            Some(key) => Err(RepositoryError::Duplicate { kind: E::KIND, key }),
            None => Ok(()),
        }
    }
}

/// JSON equality that treats `10` and `10.0` as the same number.
fn same_value(stored: &Value, probe: &Value) -> bool {
    match (stored, probe) {
        (Value::Number(stored), Value::Number(probe)) => stored.as_f64() == probe.as_f64(),
        _ => stored == probe,
    }
}
