use std::sync::Arc;

use axum::response::Response;
use serde_json::{json, Value};

use crate::config::AccessConfig;
use crate::rentals::credentials::{CredentialError, CredentialHasher};
use crate::rentals::domain::{Attributes, CredentialHash, Entity, EntityId, Place};
use crate::rentals::policy::{AccessPolicy, CallerIdentity};
use crate::rentals::repository::Repositories;
use crate::rentals::service::{PlaceRequest, RentalFacade, ReviewRequest, UserRequest};

/// Reversible stand-in for Argon2 so tests stay fast and deterministic.
pub(super) struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<CredentialHash, CredentialError> {
        Ok(CredentialHash::new(format!("plain${password}")))
    }

    fn verify(&self, password: &str, hash: &CredentialHash) -> Result<bool, CredentialError> {
        Ok(hash.as_str() == format!("plain${password}"))
    }
}

/// Hasher that stalls long enough for concurrent registrations to interleave.
pub(super) struct SlowHasher;

impl CredentialHasher for SlowHasher {
    fn hash(&self, password: &str) -> Result<CredentialHash, CredentialError> {
        std::thread::sleep(std::time::Duration::from_millis(50));
        PlainHasher.hash(password)
    }

    fn verify(&self, password: &str, hash: &CredentialHash) -> Result<bool, CredentialError> {
        PlainHasher.verify(password, hash)
    }
}

pub(super) fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(super) fn facade_with(access: AccessConfig) -> RentalFacade {
    RentalFacade::new(
        Repositories::in_memory(),
        Arc::new(PlainHasher),
        AccessPolicy::from_config(access),
    )
}

pub(super) fn facade() -> RentalFacade {
    facade_with(AccessConfig::default())
}

pub(super) fn user_request(first_name: &str, email: &str) -> UserRequest {
    UserRequest {
        attributes: attrs(json!({
            "first_name": first_name,
            "last_name": "Tester",
            "email": email,
        })),
        password: "s3cret".to_string(),
        is_admin: None,
    }
}

pub(super) fn place_request(owner: &CallerIdentity, latitude: f64, longitude: f64) -> PlaceRequest {
    PlaceRequest {
        attributes: attrs(json!({
            "title": "Loft by the river",
            "description": "Two rooms, one view",
            "price": 120.0,
            "latitude": latitude,
            "longitude": longitude,
        })),
        owner_id: owner.subject.to_string(),
        amenities: Vec::new(),
    }
}

pub(super) fn review_request(author: &CallerIdentity, place: &EntityId, rating: i64) -> ReviewRequest {
    ReviewRequest {
        attributes: attrs(json!({ "text": "Lovely stay", "rating": rating })),
        user_id: author.subject.to_string(),
        place_id: place.to_string(),
    }
}

/// A facade seeded with an admin (the bootstrap user), a place owner, a guest, and one place.
pub(super) struct World {
    pub(super) facade: RentalFacade,
    pub(super) admin: CallerIdentity,
    pub(super) owner: CallerIdentity,
    pub(super) guest: CallerIdentity,
    pub(super) place: Place,
}

pub(super) fn register(
    facade: &RentalFacade,
    creator: Option<&CallerIdentity>,
    first_name: &str,
    email: &str,
) -> CallerIdentity {
    let user = facade
        .create_user(creator, user_request(first_name, email))
        .expect("user registers");
    CallerIdentity::of(&user)
}

pub(super) fn world() -> World {
    world_with(AccessConfig::default())
}

pub(super) fn world_with(access: AccessConfig) -> World {
    let facade = facade_with(access);
    let admin = register(&facade, None, "Ada", "ada@hbnb.io");
    let owner = register(&facade, Some(&admin), "Olive", "olive@hbnb.io");
    let guest = register(&facade, Some(&admin), "Gus", "gus@hbnb.io");
    let place = facade
        .create_place(Some(&owner), place_request(&owner, 48.85, 2.35))
        .expect("place created");
    World {
        facade,
        admin,
        owner,
        guest,
        place,
    }
}

impl World {
    pub(super) fn place_id(&self) -> EntityId {
        self.place.id()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
