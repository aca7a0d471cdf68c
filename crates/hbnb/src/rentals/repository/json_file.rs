use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::table::EntityTable;
use super::{Repository, RepositoryError};
use crate::rentals::domain::{Attributes, Entity, EntityId};

/// Durable repository persisting one JSON array per entity type.
///
/// Every mutation is applied to a copy of the table, written to a sibling temp file, and
/// renamed over the document before the in-memory state is swapped, so a failed write leaves
/// both the file and the repository unchanged.
#[derive(Debug)]
pub struct JsonFileRepository<E: Entity> {
    path: PathBuf,
    table: Mutex<EntityTable<E>>,
}

impl<E: Entity> JsonFileRepository<E> {
    /// Open the collection document for `E` inside `dir`, creating the directory if needed.
    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Self::open(dir.join(format!("{}.json", E::KIND.collection())))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let table = if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                EntityTable::default()
            } else {
                let records = serde_json::from_slice::<Vec<E::Record>>(&bytes)?;
                EntityTable::from_rows(records.into_iter().map(E::from_record).collect())?
            }
        } else {
            EntityTable::default()
        };

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, EntityTable<E>>, RepositoryError> {
        self.table
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    fn persist(&self, table: &EntityTable<E>) -> Result<(), RepositoryError> {
        let rows: Vec<E::Record> = table.rows().map(E::to_record).collect();
        let encoded = serde_json::to_vec_pretty(&rows)?;

        let staging = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&staging)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut EntityTable<E>) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let outcome = change(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(outcome)
    }
}

impl<E: Entity> Repository<E> for JsonFileRepository<E> {
    fn add(&self, entity: E) -> Result<(), RepositoryError> {
        self.mutate(|table| table.insert(entity))
    }

    fn add_first(&self, entity: E) -> Result<bool, RepositoryError> {
        let mut guard = self.lock()?;
        if !guard.is_empty() {
            return Ok(false);
        }
        let mut next = guard.clone();
        next.insert(entity)?;
        self.persist(&next)?;
        *guard = next;
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
        self.mutate(|table| table.update(id, changes))
    }

    fn delete(&self, id: &EntityId) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        if guard.get(id).is_none() {
            return Ok(());
        }
        let mut next = guard.clone();
        next.remove(id);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}
