use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::table::EntityTable;
use super::{Repository, RepositoryError};
use crate::rentals::domain::{Attributes, Entity, EntityId};

/// Process-local repository used by tests and the default server configuration.
#[derive(Debug)]
pub struct InMemoryRepository<E: Entity> {
    table: Mutex<EntityTable<E>>,
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self {
            table: Mutex::new(EntityTable::default()),
        }
    }
}

impl<E: Entity> InMemoryRepository<E> {
    fn lock(&self) -> Result<MutexGuard<'_, EntityTable<E>>, RepositoryError> {
        self.table
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    fn add(&self, entity: E) -> Result<(), RepositoryError> {
        self.lock()?.insert(entity)
    }

    fn add_first(&self, entity: E) -> Result<bool, RepositoryError> {
        let mut table = self.lock()?;
        if !table.is_empty() {
            return Ok(false);
        }
        table.insert(entity)?;
        Ok(true)
    }

    fn get(&self, id: &EntityId) -> Result<Option<E>, RepositoryError> {
        Ok(self.lock()?.get(id))
    }

    fn get_all(&self) -> Result<Vec<E>, RepositoryError> {
        Ok(self.lock()?.rows().cloned().collect())
    }

    fn get_by_attribute(&self, name: &str, value: &Value) -> Result<Option<E>, RepositoryError> {
        Ok(self.lock()?.find(name, value))
    }

    fn update(&self, id: &EntityId, changes: &Attributes) -> Result<E, RepositoryError> {
        self.lock()?.update(id, changes)
    }

    fn delete(&self, id: &EntityId) -> Result<(), RepositoryError> {
        self.lock()?.remove(id);
        Ok(())
    }
}
