//! Storage-agnostic repository contract plus the in-memory and JSON-file implementations.

mod json_file;
mod memory;
mod table;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::domain::{
    Amenity, Attributes, Entity, EntityId, EntityKind, ModelError, Place, Review, UniqueKey, User,
};
use crate::config::{StorageBackend, StorageConfig};

pub use json_file::JsonFileRepository;
pub use memory::InMemoryRepository;

/// CRUD and attribute lookup over one entity type.
pub trait Repository<E: Entity>: Send + Sync {
    /// Store a new entity. Fails on an identifier or unique-key collision.
    fn add(&self, entity: E) -> Result<(), RepositoryError>;
    /// Store `entity` only if the repository holds no rows yet, in one step.
    /// Returns `false` without storing anything when rows already exist.
    fn add_first(&self, entity: E) -> Result<bool, RepositoryError>;
    fn get(&self, id: &EntityId) -> Result<Option<E>, RepositoryError>;
    /// Every stored entity, in no particular order.
    fn get_all(&self) -> Result<Vec<E>, RepositoryError>;
    /// First entity whose named attribute equals `value`.
    fn get_by_attribute(&self, name: &str, value: &Value) -> Result<Option<E>, RepositoryError>;
    /// Merge a partial attribute map into a stored entity and return the result.
    fn update(&self, id: &EntityId, changes: &Attributes) -> Result<E, RepositoryError>;
    /// Remove an entity. Deleting an absent id is a no-op.
    fn delete(&self, id: &EntityId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{kind} {id} already exists")]
    Conflict { kind: EntityKind, id: EntityId },
    #[error("{kind} with {key} already exists")]
    Duplicate { kind: EntityKind, key: UniqueKey },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored data is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// One repository per entity family, shared by the facade.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn Repository<User>>,
    pub places: Arc<dyn Repository<Place>>,
    pub amenities: Arc<dyn Repository<Amenity>>,
    pub reviews: Arc<dyn Repository<Review>>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryRepository::<User>::default()),
            places: Arc::new(InMemoryRepository::<Place>::default()),
            amenities: Arc::new(InMemoryRepository::<Amenity>::default()),
            reviews: Arc::new(InMemoryRepository::<Review>::default()),
        }
    }

    /// Open (or create) one JSON document per entity family inside `dir`.
    pub fn json_files(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = dir.as_ref();
        Ok(Self {
            users: Arc::new(JsonFileRepository::<User>::open_in(dir)?),
            places: Arc::new(JsonFileRepository::<Place>::open_in(dir)?),
            amenities: Arc::new(JsonFileRepository::<Amenity>::open_in(dir)?),
            reviews: Arc::new(JsonFileRepository::<Review>::open_in(dir)?),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, RepositoryError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::JsonFiles => Self::json_files(&config.data_dir),
        }
    }
}
