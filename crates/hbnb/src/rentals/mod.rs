//! Property-rental domain core: entities, repositories, access policy, and the facade that
//! composes them.

pub mod credentials;
pub mod domain;
pub mod policy;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use credentials::{Argon2Hasher, CredentialError, CredentialHasher};
pub use domain::{
    apply_update, Amenity, Attributes, Entity, EntityId, EntityKind, ModelError, OwnerSummary,
    Place, Review, User, UserView,
};
pub use policy::{AccessPolicy, CallerIdentity, Decision, DenyReason, Operation, Target};
pub use repository::{
    InMemoryRepository, JsonFileRepository, Repositories, Repository, RepositoryError,
};
pub use router::{rental_router, CALLER_HEADER};
pub use service::{
    PlaceDetails, PlaceRequest, RentalError, RentalFacade, ReviewRequest, UserRequest,
};
