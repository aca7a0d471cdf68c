use serde::{Deserialize, Serialize};

use super::domain::{
    is_fixed_field, Amenity, Attributes, Entity, EntityId, Place, Review, User,
};
use crate::config::{AccessConfig, AmenityAccess};

/// User fields only an admin may change, even on their own account.
pub const RESTRICTED_USER_FIELDS: &[&str] = &["email", "password", "is_admin"];

/// Fields callers may never send; the facade writes them itself.
const INTERNAL_FIELDS: &[&str] = &["password_hash"];

/// Resolved caller identity supplied by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub subject: EntityId,
    pub is_admin: bool,
}

impl CallerIdentity {
    pub fn of(user: &User) -> Self {
        Self {
            subject: user.id(),
            is_admin: user.is_admin(),
        }
    }
}

/// Mutation being attempted.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    CreateUser {
        first_user: bool,
        requested_admin: bool,
    },
    UpdateUser {
        changes: &'a Attributes,
    },
    CreatePlace {
        owner_id: EntityId,
    },
    UpdatePlace {
        changes: &'a Attributes,
    },
    AttachAmenity,
    CreateAmenity,
    UpdateAmenity {
        changes: &'a Attributes,
    },
    CreateReview {
        author_id: EntityId,
    },
    UpdateReview {
        changes: &'a Attributes,
    },
    DeleteReview,
}

impl Operation<'_> {
    fn changes(&self) -> Option<&Attributes> {
        match self {
            Operation::UpdateUser { changes }
            | Operation::UpdatePlace { changes }
            | Operation::UpdateAmenity { changes }
            | Operation::UpdateReview { changes } => Some(changes),
            _ => None,
        }
    }
}

/// Entity the operation acts on, when it already exists.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    None,
    User(&'a User),
    Place(&'a Place),
    Amenity(&'a Amenity),
    Review(&'a Review),
}

impl Target<'_> {
    /// Identity allowed to mutate the target besides admins.
    fn owner(&self) -> Option<EntityId> {
        match self {
            Target::None | Target::Amenity(_) => None,
            Target::User(user) => Some(user.id()),
            Target::Place(place) => Some(place.owner_id()),
            Target::Review(review) => Some(review.user_id()),
        }
    }

    fn is_fixed(&self, field: &str) -> bool {
        INTERNAL_FIELDS.contains(&field)
            || match self {
                Target::None => false,
                Target::User(_) => is_fixed_field::<User>(field),
                Target::Place(_) => is_fixed_field::<Place>(field),
                Target::Amenity(_) => is_fixed_field::<Amenity>(field),
                Target::Review(_) => is_fixed_field::<Review>(field),
            }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Why a mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("authentication required")]
    Anonymous,
    #[error("only the owner or an admin may modify this {0}")]
    NotOwner(&'static str),
    #[error("admin privileges required")]
    AdminRequired,
    #[error("places can only be created with your own identity as owner")]
    ForeignOwner,
    #[error("reviews can only be written with your own identity as author")]
    ForeignAuthor,
    #[error("{0} is fixed at creation")]
    FixedField(String),
    #[error("changing {0} requires admin privileges")]
    RestrictedField(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("caller does not match a registered user")]
    UnknownCaller,
}

/// Central decision point for every mutating facade operation.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    config: AccessConfig,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::from_config(AccessConfig::default())
    }
}

impl AccessPolicy {
    pub fn from_config(config: AccessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn default_admin(&self) -> bool {
        self.config.default_admin
    }

    pub fn may_mutate(
        &self,
        caller: Option<&CallerIdentity>,
        operation: &Operation<'_>,
        target: Target<'_>,
    ) -> Decision {
        if let Some(field) = operation
            .changes()
            .and_then(|changes| changes.keys().find(|key| target.is_fixed(key)))
        {
            return Decision::Deny(DenyReason::FixedField(field.clone()));
        }

        let Some(caller) = caller else {
            return match operation {
                Operation::CreateUser {
                    first_user: true, ..
                } => Decision::Allow,
                Operation::CreateUser {
                    requested_admin: false,
                    ..
                } if self.config.open_registration => Decision::Allow,
                Operation::CreateUser { .. } if self.config.open_registration => {
                    Decision::Deny(DenyReason::AdminRequired)
                }
                _ => Decision::Deny(DenyReason::Anonymous),
            };
        };

        match operation {
            Operation::CreateUser {
                first_user,
                requested_admin,
            } => {
                if caller.is_admin {
                    Decision::Allow
                } else if *requested_admin {
                    Decision::Deny(DenyReason::AdminRequired)
                } else if *first_user || self.config.open_registration {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::AdminRequired)
                }
            }
            Operation::CreatePlace { owner_id } => {
                if *owner_id == caller.subject {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::ForeignOwner)
                }
            }
            Operation::CreateReview { author_id } => {
                if *author_id == caller.subject {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::ForeignAuthor)
                }
            }
            Operation::CreateAmenity | Operation::UpdateAmenity { .. } => {
                match self.config.amenity_access {
                    AmenityAccess::AnyAuthenticated => Decision::Allow,
                    AmenityAccess::AdminOnly if caller.is_admin => Decision::Allow,
                    AmenityAccess::AdminOnly => Decision::Deny(DenyReason::AdminRequired),
                }
            }
            Operation::UpdateUser { changes } => {
                if caller.is_admin {
                    return Decision::Allow;
                }
                if target.owner() != Some(caller.subject) {
                    return Decision::Deny(DenyReason::NotOwner("user"));
                }
                match changes
                    .keys()
                    .find(|key| RESTRICTED_USER_FIELDS.contains(&key.as_str()))
                {
                    Some(field) => Decision::Deny(DenyReason::RestrictedField(field.clone())),
                    None => Decision::Allow,
                }
            }
            Operation::UpdatePlace { .. } | Operation::AttachAmenity => {
                owner_or_admin(caller, &target, "place")
            }
            Operation::UpdateReview { .. } | Operation::DeleteReview => {
                owner_or_admin(caller, &target, "review")
            }
        }
    }
}

fn owner_or_admin(caller: &CallerIdentity, target: &Target<'_>, label: &'static str) -> Decision {
    if caller.is_admin || target.owner() == Some(caller.subject) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotOwner(label))
    }
}
