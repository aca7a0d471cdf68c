use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::credentials::{CredentialError, CredentialHasher};
use super::domain::{
    apply_update, normalize_email, Amenity, Attributes, Entity, EntityId, EntityKind, ModelError,
    OwnerSummary, Place, Review, UniqueKey, User,
};
use super::policy::{AccessPolicy, CallerIdentity, DenyReason, Operation, Target};
use super::repository::{Repositories, Repository, RepositoryError};

/// Payload for `create_user`. Name and email travel in `attributes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRequest {
    #[serde(flatten)]
    pub attributes: Attributes,
    pub password: String,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Payload for `create_place`. Amenities may be referenced by id or by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceRequest {
    #[serde(flatten)]
    pub attributes: Attributes,
    pub owner_id: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Payload for `create_review`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(flatten)]
    pub attributes: Attributes,
    pub user_id: String,
    pub place_id: String,
}

/// A place with its owner and amenities resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceDetails {
    pub place: Place,
    pub owner: OwnerSummary,
    pub amenities: Vec<Amenity>,
}

/// Single entry point composing repositories, credential hashing, and the access policy.
pub struct RentalFacade {
    repositories: Repositories,
    hasher: Arc<dyn CredentialHasher>,
    policy: AccessPolicy,
}

impl RentalFacade {
    pub fn new(
        repositories: Repositories,
        hasher: Arc<dyn CredentialHasher>,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            repositories,
            hasher,
            policy,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    // Users

    /// Register a user. The first user ever created is an admin.
    pub fn create_user(
        &self,
        caller: Option<&CallerIdentity>,
        request: UserRequest,
    ) -> Result<User, RentalError> {
        let email = User::email_from(&request.attributes)?;
        let first_user = self.repositories.users.get_all()?.is_empty();
        let requested_admin = request.is_admin == Some(true);

        self.policy
            .may_mutate(
                caller,
                &Operation::CreateUser {
                    first_user,
                    requested_admin,
                },
                Target::None,
            )
            .into_result()?;

        if self
            .repositories
            .users
            .get_by_attribute("email", &Value::String(email.clone()))?
            .is_some()
        {
            return Err(RentalError::Duplicate {
                kind: EntityKind::User,
                key: UniqueKey::new("email", email),
            });
        }

        if request.password.is_empty() {
            return Err(RentalError::Validation {
                field: "password",
                reason: "must not be empty".to_string(),
            });
        }

        let is_admin = if first_user {
            true
        } else if caller.is_some_and(|caller| caller.is_admin) {
            request.is_admin.unwrap_or(self.policy.default_admin())
        } else {
            self.policy.default_admin()
        };

        let credential = self.hasher.hash(&request.password)?;
        let user = User::new(&request.attributes, credential, is_admin)?;
        if first_user {
            // Another registration may have claimed the empty store since the check above.
            if !self.repositories.users.add_first(user.clone())? {
                debug!("bootstrap already claimed, registering as a regular user");
                return self.create_user(caller, request);
            }
        } else {
            self.repositories.users.add(user.clone())?;
        }
        debug!(user_id = %user.id(), is_admin, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: &EntityId) -> Result<User, RentalError> {
        require(self.repositories.users.as_ref(), id)
    }

    pub fn get_all_users(&self) -> Result<Vec<User>, RentalError> {
        Ok(self.repositories.users.get_all()?)
    }

    /// Look up a user by email, normalizing the input first.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RentalError> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(self
            .repositories
            .users
            .get_by_attribute("email", &Value::String(email))?)
    }

    /// Update a user. Email and password changes are only reachable by admins, who get the
    /// same uniqueness and hashing treatment as registration.
    pub fn update_user(
        &self,
        caller: Option<&CallerIdentity>,
        id: &EntityId,
        changes: &Attributes,
    ) -> Result<User, RentalError> {
        let user = self.get_user(id)?;
        self.policy
            .may_mutate(caller, &Operation::UpdateUser { changes }, Target::User(&user))
            .into_result()?;

        let mut staged = changes.clone();
        if staged.contains_key("email") {
            let email = User::email_from(&staged)?;
            let taken = self
                .repositories
                .users
                .get_by_attribute("email", &Value::String(email.clone()))?
                .is_some_and(|other| other.id() != user.id());
            if taken {
                return Err(RentalError::Duplicate {
                    kind: EntityKind::User,
                    key: UniqueKey::new("email", email),
                });
            }
        }
        if let Some(password) = staged.remove("password") {
            let credential = match password {
                Value::String(password) if !password.is_empty() => self.hasher.hash(&password)?,
                Value::String(_) => {
                    return Err(RentalError::Validation {
                        field: "password",
                        reason: "must not be empty".to_string(),
                    })
                }
                _ => {
                    return Err(RentalError::TypeMismatch {
                        field: "password",
                        expected: "string",
                    })
                }
            };
            staged.insert(
                "password_hash".to_string(),
                Value::String(credential.as_str().to_string()),
            );
        }

        let updated = self.repositories.users.update(id, &staged)?;
        debug!(user_id = %id, "user updated");
        Ok(updated)
    }

    /// Verify credentials and return the identity to act as.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<CallerIdentity, RentalError> {
        let user = self
            .get_user_by_email(email)?
            .ok_or(DenyReason::InvalidCredentials)?;
        if !self.hasher.verify(password, user.credential())? {
            return Err(DenyReason::InvalidCredentials.into());
        }
        Ok(CallerIdentity::of(&user))
    }

    /// Turn a subject id into an identity, reading the admin flag from storage.
    pub fn resolve_caller(&self, subject: &EntityId) -> Result<CallerIdentity, RentalError> {
        let user = self
            .repositories
            .users
            .get(subject)?
            .ok_or(DenyReason::UnknownCaller)?;
        Ok(CallerIdentity::of(&user))
    }

    // Amenities

    pub fn create_amenity(
        &self,
        caller: Option<&CallerIdentity>,
        attributes: &Attributes,
    ) -> Result<Amenity, RentalError> {
        self.policy
            .may_mutate(caller, &Operation::CreateAmenity, Target::None)
            .into_result()?;

        let amenity = Amenity::new(attributes)?;
        self.ensure_amenity_name_free(amenity.name(), None)?;
        self.repositories.amenities.add(amenity.clone())?;
        debug!(amenity_id = %amenity.id(), name = amenity.name(), "amenity created");
        Ok(amenity)
    }

    pub fn get_amenity(&self, id: &EntityId) -> Result<Amenity, RentalError> {
        require(self.repositories.amenities.as_ref(), id)
    }

    pub fn get_all_amenities(&self) -> Result<Vec<Amenity>, RentalError> {
        Ok(self.repositories.amenities.get_all()?)
    }

    pub fn get_amenity_by_name(&self, name: &str) -> Result<Option<Amenity>, RentalError> {
        Ok(self
            .repositories
            .amenities
            .get_by_attribute("name", &json!(name))?)
    }

    pub fn update_amenity(
        &self,
        caller: Option<&CallerIdentity>,
        id: &EntityId,
        changes: &Attributes,
    ) -> Result<Amenity, RentalError> {
        let amenity = self.get_amenity(id)?;
        self.policy
            .may_mutate(
                caller,
                &Operation::UpdateAmenity { changes },
                Target::Amenity(&amenity),
            )
            .into_result()?;

        if let Some(Value::String(name)) = changes.get("name") {
            self.ensure_amenity_name_free(name, Some(id))?;
        }

        let updated = self.repositories.amenities.update(id, changes)?;
        debug!(amenity_id = %id, "amenity updated");
        Ok(updated)
    }

    fn ensure_amenity_name_free(
        &self,
        name: &str,
        owner: Option<&EntityId>,
    ) -> Result<(), RentalError> {
        match self.get_amenity_by_name(name)? {
            Some(existing) if Some(&existing.id()) != owner => Err(RentalError::Duplicate {
                kind: EntityKind::Amenity,
                key: UniqueKey::new("name", name),
            }),
            _ => Ok(()),
        }
    }

    /// Resolve an amenity reference given either as an identifier or as a name.
    fn resolve_amenity(&self, reference: &str) -> Result<Amenity, RentalError> {
        if let Ok(id) = reference.parse::<EntityId>() {
            if let Some(amenity) = self.repositories.amenities.get(&id)? {
                return Ok(amenity);
            }
        }
        self.get_amenity_by_name(reference)?
            .ok_or_else(|| RentalError::not_found(EntityKind::Amenity, reference))
    }

    // Places

    /// List a place. The caller must name themselves as owner.
    pub fn create_place(
        &self,
        caller: Option<&CallerIdentity>,
        request: PlaceRequest,
    ) -> Result<Place, RentalError> {
        let owner_id = parse_reference(EntityKind::User, &request.owner_id)?;
        self.policy
            .may_mutate(caller, &Operation::CreatePlace { owner_id }, Target::None)
            .into_result()?;
        self.get_user(&owner_id)?;

        let amenities = request
            .amenities
            .iter()
            .map(|reference| self.resolve_amenity(reference).map(|amenity| amenity.id()))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let place = Place::new(&request.attributes, owner_id, amenities)?;
        self.ensure_location_free(&place)?;
        self.repositories.places.add(place.clone())?;
        debug!(place_id = %place.id(), owner_id = %owner_id, "place created");
        Ok(place)
    }

    pub fn get_place(&self, id: &EntityId) -> Result<Place, RentalError> {
        require(self.repositories.places.as_ref(), id)
    }

    pub fn get_all_places(&self) -> Result<Vec<Place>, RentalError> {
        Ok(self.repositories.places.get_all()?)
    }

    pub fn get_place_details(&self, id: &EntityId) -> Result<PlaceDetails, RentalError> {
        let place = self.get_place(id)?;
        let owner = self.get_user(&place.owner_id())?.owner_summary();
        let mut amenities = Vec::with_capacity(place.amenities().len());
        for amenity_id in place.amenities() {
            if let Some(amenity) = self.repositories.amenities.get(amenity_id)? {
                amenities.push(amenity);
            }
        }
        Ok(PlaceDetails {
            place,
            owner,
            amenities,
        })
    }

    /// Update a place. Amenities may be listed by id or by name.
    pub fn update_place(
        &self,
        caller: Option<&CallerIdentity>,
        id: &EntityId,
        changes: &Attributes,
    ) -> Result<Place, RentalError> {
        let place = self.get_place(id)?;
        self.policy
            .may_mutate(caller, &Operation::UpdatePlace { changes }, Target::Place(&place))
            .into_result()?;

        let mut staged = changes.clone();
        if let Some(Value::Array(references)) = changes.get("amenities") {
            let mut ids = Vec::with_capacity(references.len());
            for reference in references {
                match reference.as_str() {
                    Some(reference) => ids.push(json!(self.resolve_amenity(reference)?.id())),
                    None => ids.push(reference.clone()),
                }
            }
            staged.insert("amenities".to_string(), Value::Array(ids));
        }

        let mut candidate = place.clone();
        apply_update(&mut candidate, &staged)?;
        self.ensure_location_free(&candidate)?;

        let updated = self.repositories.places.update(id, &staged)?;
        debug!(place_id = %id, "place updated");
        Ok(updated)
    }

    /// Attach an amenity, by id or name, to a place. Attaching twice changes nothing.
    pub fn add_amenity_to_place(
        &self,
        caller: Option<&CallerIdentity>,
        place_id: &EntityId,
        amenity: &str,
    ) -> Result<Place, RentalError> {
        let place = self.get_place(place_id)?;
        self.policy
            .may_mutate(caller, &Operation::AttachAmenity, Target::Place(&place))
            .into_result()?;

        let amenity = self.resolve_amenity(amenity)?;
        if place.has_amenity(&amenity.id()) {
            return Ok(place);
        }

        let ids: Vec<String> = place
            .amenities()
            .iter()
            .chain(std::iter::once(&amenity.id()))
            .map(ToString::to_string)
            .collect();
        let mut changes = Attributes::new();
        changes.insert("amenities".to_string(), json!(ids));

        let updated = self.repositories.places.update(place_id, &changes)?;
        debug!(place_id = %place_id, amenity_id = %amenity.id(), "amenity attached");
        Ok(updated)
    }

    fn ensure_location_free(&self, candidate: &Place) -> Result<(), RentalError> {
        let (latitude, longitude) = candidate.location();
        let taken = self
            .repositories
            .places
            .get_all()?
            .iter()
            .any(|other| other.id() != candidate.id() && other.is_at(latitude, longitude));
        if taken {
            return Err(RentalError::Duplicate {
                kind: EntityKind::Place,
                key: UniqueKey::new("location", format!("{latitude},{longitude}")),
            });
        }
        Ok(())
    }

    // Reviews

    /// Review a place. Owners cannot review their own place and nobody reviews one twice.
    pub fn create_review(
        &self,
        caller: Option<&CallerIdentity>,
        request: ReviewRequest,
    ) -> Result<Review, RentalError> {
        let author_id = parse_reference(EntityKind::User, &request.user_id)?;
        let place_id = parse_reference(EntityKind::Place, &request.place_id)?;
        self.policy
            .may_mutate(caller, &Operation::CreateReview { author_id }, Target::None)
            .into_result()?;

        self.get_user(&author_id)?;
        let place = self.get_place(&place_id)?;
        let review = Review::new(&request.attributes, author_id, place_id)?;

        if place.owner_id() == author_id {
            return Err(RentalError::Conflict(
                "you cannot review your own place".to_string(),
            ));
        }
        let already_reviewed = self
            .repositories
            .reviews
            .get_all()?
            .iter()
            .any(|existing| existing.user_id() == author_id && existing.place_id() == place_id);
        if already_reviewed {
            return Err(RentalError::Conflict(
                "you have already reviewed this place".to_string(),
            ));
        }

        self.repositories.reviews.add(review.clone())?;
        debug!(review_id = %review.id(), place_id = %place_id, "review created");
        Ok(review)
    }

    pub fn get_review(&self, id: &EntityId) -> Result<Review, RentalError> {
        require(self.repositories.reviews.as_ref(), id)
    }

    pub fn get_all_reviews(&self) -> Result<Vec<Review>, RentalError> {
        Ok(self.repositories.reviews.get_all()?)
    }

    pub fn get_reviews_for_place(&self, place_id: &EntityId) -> Result<Vec<Review>, RentalError> {
        self.get_place(place_id)?;
        Ok(self
            .repositories
            .reviews
            .get_all()?
            .into_iter()
            .filter(|review| review.place_id() == *place_id)
            .collect())
    }

    pub fn update_review(
        &self,
        caller: Option<&CallerIdentity>,
        id: &EntityId,
        changes: &Attributes,
    ) -> Result<Review, RentalError> {
        let review = self.get_review(id)?;
        self.policy
            .may_mutate(
                caller,
                &Operation::UpdateReview { changes },
                Target::Review(&review),
            )
            .into_result()?;

        let updated = self.repositories.reviews.update(id, changes)?;
        debug!(review_id = %id, "review updated");
        Ok(updated)
    }

    pub fn delete_review(
        &self,
        caller: Option<&CallerIdentity>,
        id: &EntityId,
    ) -> Result<(), RentalError> {
        let review = self.get_review(id)?;
        self.policy
            .may_mutate(caller, &Operation::DeleteReview, Target::Review(&review))
            .into_result()?;

        self.repositories.reviews.delete(id)?;
        debug!(review_id = %id, "review deleted");
        Ok(())
    }
}

fn require<E: Entity>(repository: &dyn Repository<E>, id: &EntityId) -> Result<E, RentalError> {
    repository
        .get(id)?
        .ok_or_else(|| RentalError::not_found(E::KIND, id))
}

fn parse_reference(kind: EntityKind, raw: &str) -> Result<EntityId, RentalError> {
    raw.parse().map_err(|_| RentalError::not_found(kind, raw))
}

/// Typed failures surfaced by the facade.
#[derive(Debug, thiserror::Error)]
pub enum RentalError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{field} must be a {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },
    #[error("{field} cannot be changed after creation")]
    ImmutableField { field: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("{kind} with {key} already exists")]
    Duplicate { kind: EntityKind, key: UniqueKey },
    #[error("{0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(DenyReason),
    #[error("storage unavailable: {0}")]
    Storage(RepositoryError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl RentalError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<ModelError> for RentalError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::Validation { field, reason } => Self::Validation { field, reason },
            ModelError::TypeMismatch { field, expected } => Self::TypeMismatch { field, expected },
            ModelError::ImmutableField { field } => Self::ImmutableField { field },
        }
    }
}

impl From<DenyReason> for RentalError {
    fn from(value: DenyReason) -> Self {
        match value {
            DenyReason::FixedField(field) => Self::ImmutableField { field },
            other => Self::Unauthorized(other),
        }
    }
}

impl From<RepositoryError> for RentalError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Model(err) => err.into(),
            RepositoryError::NotFound { kind, id } => Self::not_found(kind, id),
            RepositoryError::Duplicate {
                kind: EntityKind::Review,
                ..
            } => Self::Conflict("you have already reviewed this place".to_string()),
            RepositoryError::Duplicate { kind, key } => Self::Duplicate { kind, key },
            conflict @ RepositoryError::Conflict { .. } => Self::Conflict(conflict.to_string()),
            other => Self::Storage(other),
        }
    }
}
