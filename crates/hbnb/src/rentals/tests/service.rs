use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;

use super::common::*;
use crate::config::{AccessConfig, AmenityAccess};
use crate::rentals::policy::AccessPolicy;
use crate::rentals::repository::Repositories;
use crate::rentals::service::RentalFacade;
use crate::rentals::domain::{Entity, EntityId, EntityKind};
use crate::rentals::policy::{CallerIdentity, DenyReason};
use crate::rentals::service::RentalError;

#[test]
fn first_user_is_admin_and_later_registration_needs_an_admin() {
    let facade = facade();
    let first = facade
        .create_user(None, user_request("Ada", "ada@hbnb.io"))
        .expect("bootstrap user");
    assert!(first.is_admin());

    match facade.create_user(None, user_request("Bo", "bo@hbnb.io")) {
        Err(RentalError::Unauthorized(DenyReason::Anonymous)) => {}
        other => panic!("expected anonymous denial, got {other:?}"),
    }

    let admin = CallerIdentity::of(&first);
    let second = facade
        .create_user(Some(&admin), user_request("Bo", "bo@hbnb.io"))
        .expect("admin registers user");
    assert!(!second.is_admin());
}

fn race_anonymous_registrations(access: AccessConfig) -> (RentalFacade, Vec<Result<bool, RentalError>>) {
    let facade = RentalFacade::new(
        Repositories::in_memory(),
        Arc::new(SlowHasher),
        AccessPolicy::from_config(access),
    );
    let barrier = Barrier::new(2);
    let results = thread::scope(|scope| {
        let handles: Vec<_> = [("Ada", "ada@hbnb.io"), ("Bo", "bo@hbnb.io")]
            .into_iter()
            .map(|(name, email)| {
                let facade = &facade;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    facade
                        .create_user(None, user_request(name, email))
                        .map(|user| user.is_admin())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("registration thread"))
            .collect()
    });
    (facade, results)
}

#[test]
fn concurrent_bootstrap_registrations_yield_a_single_admin() {
    let (facade, results) = race_anonymous_registrations(AccessConfig::default());

    let admins = results.iter().filter(|result| matches!(result, Ok(true))).count();
    assert_eq!(admins, 1, "results: {results:?}");
    assert!(
        results
            .iter()
            .any(|result| matches!(result, Err(RentalError::Unauthorized(DenyReason::Anonymous)))),
        "results: {results:?}"
    );
    assert_eq!(facade.get_all_users().expect("users").len(), 1);
}

#[test]
fn concurrent_open_registrations_promote_only_the_first() {
    let (facade, results) = race_anonymous_registrations(AccessConfig {
        open_registration: true,
        ..AccessConfig::default()
    });

    let mut flags: Vec<bool> = results
        .into_iter()
        .map(|result| result.expect("open registration succeeds"))
        .collect();
    flags.sort();
    assert_eq!(flags, vec![false, true]);
    assert_eq!(facade.get_all_users().expect("users").len(), 2);
}

#[test]
fn admins_choose_the_admin_flag_and_defaults_come_from_configuration() {
    let facade = facade_with(AccessConfig {
        default_admin: true,
        open_registration: true,
        ..AccessConfig::default()
    });
    let admin = register(&facade, None, "Ada", "ada@hbnb.io");

    let mut request = user_request("Bo", "bo@hbnb.io");
    request.is_admin = Some(false);
    let explicit = facade
        .create_user(Some(&admin), request)
        .expect("admin sets flag");
    assert!(!explicit.is_admin());

    let defaulted = facade
        .create_user(None, user_request("Cy", "cy@hbnb.io"))
        .expect("open registration");
    assert!(defaulted.is_admin());
}

#[test]
fn duplicate_emails_are_rejected_after_normalization() {
    let world = world();
    match world
        .facade
        .create_user(Some(&world.admin), user_request("Other", "  OLIVE@HBNB.IO "))
    {
        Err(RentalError::Duplicate { kind, key }) => {
            assert_eq!(kind, EntityKind::User);
            assert_eq!(key.value, "olive@hbnb.io");
        }
        other => panic!("expected duplicate email, got {other:?}"),
    }

    let found = world
        .facade
        .get_user_by_email("Olive@HBNB.io")
        .expect("lookup")
        .expect("owner found");
    assert_eq!(found.id(), world.owner.subject);
    assert!(world
        .facade
        .get_user_by_email("not an email")
        .expect("lookup")
        .is_none());
}

#[test]
fn passwords_are_hashed_and_verified() {
    let world = world();
    let stored = world.facade.get_user(&world.owner.subject).expect("owner");
    assert_eq!(stored.credential().as_str(), "plain$s3cret");

    let identity = world
        .facade
        .authenticate("OLIVE@hbnb.io", "s3cret")
        .expect("correct password");
    assert_eq!(identity, world.owner);

    for (email, password) in [("olive@hbnb.io", "wrong"), ("nobody@hbnb.io", "s3cret")] {
        match world.facade.authenticate(email, password) {
            Err(RentalError::Unauthorized(DenyReason::InvalidCredentials)) => {}
            other => panic!("expected invalid credentials, got {other:?}"),
        }
    }
}

#[test]
fn empty_passwords_are_rejected() {
    let facade = facade();
    let mut request = user_request("Ada", "ada@hbnb.io");
    request.password.clear();
    assert!(matches!(
        facade.create_user(None, request),
        Err(RentalError::Validation {
            field: "password",
            ..
        })
    ));
}

#[test]
fn resolve_caller_reads_the_stored_admin_flag() {
    let world = world();
    assert_eq!(
        world.facade.resolve_caller(&world.admin.subject).expect("admin"),
        world.admin
    );
    assert!(matches!(
        world.facade.resolve_caller(&EntityId::generate()),
        Err(RentalError::Unauthorized(DenyReason::UnknownCaller))
    ));
}

#[test]
fn users_update_their_names_but_not_restricted_fields() {
    let world = world();
    let renamed = world
        .facade
        .update_user(
            Some(&world.owner),
            &world.owner.subject,
            &attrs(json!({ "first_name": "Liv" })),
        )
        .expect("self rename");
    assert_eq!(renamed.first_name(), "Liv");

    match world.facade.update_user(
        Some(&world.owner),
        &world.owner.subject,
        &attrs(json!({ "email": "liv@hbnb.io" })),
    ) {
        Err(RentalError::Unauthorized(DenyReason::RestrictedField(field))) => {
            assert_eq!(field, "email")
        }
        other => panic!("expected restricted field denial, got {other:?}"),
    }

    assert!(matches!(
        world.facade.update_user(
            Some(&world.guest),
            &world.owner.subject,
            &attrs(json!({ "first_name": "Hacked" })),
        ),
        Err(RentalError::Unauthorized(DenyReason::NotOwner("user")))
    ));
}

#[test]
fn admins_change_emails_and_passwords_with_the_same_guarantees() {
    let world = world();
    assert!(matches!(
        world.facade.update_user(
            Some(&world.admin),
            &world.owner.subject,
            &attrs(json!({ "email": "GUS@hbnb.io" })),
        ),
        Err(RentalError::Duplicate { .. })
    ));

    let updated = world
        .facade
        .update_user(
            Some(&world.admin),
            &world.owner.subject,
            &attrs(json!({ "email": "Liv@HBNB.io", "password": "n3w" })),
        )
        .expect("admin update");
    assert_eq!(updated.email(), "liv@hbnb.io");
    assert_eq!(updated.credential().as_str(), "plain$n3w");
    assert!(world.facade.authenticate("liv@hbnb.io", "n3w").is_ok());
}

#[test]
fn duplicate_locations_bad_latitude_and_price_kind_are_rejected() {
    let world = world();

    assert!(matches!(
        world
            .facade
            .create_place(Some(&world.guest), place_request(&world.guest, 48.85, 2.35)),
        Err(RentalError::Duplicate {
            kind: EntityKind::Place,
            ..
        })
    ));
    assert!(matches!(
        world
            .facade
            .create_place(Some(&world.guest), place_request(&world.guest, 91.0, 2.35)),
        Err(RentalError::Validation {
            field: "latitude",
            ..
        })
    ));

    let mut request = place_request(&world.guest, 10.0, 10.0);
    request.attributes.insert("price".to_string(), json!("10"));
    assert!(matches!(
        world.facade.create_place(Some(&world.guest), request),
        Err(RentalError::TypeMismatch { field: "price", .. })
    ));
}

#[test]
fn place_owner_must_exist_and_be_the_caller() {
    let world = world();
    assert!(matches!(
        world
            .facade
            .create_place(Some(&world.guest), place_request(&world.owner, 1.0, 1.0)),
        Err(RentalError::Unauthorized(DenyReason::ForeignOwner))
    ));

    let ghost = CallerIdentity {
        subject: EntityId::generate(),
        is_admin: false,
    };
    assert!(matches!(
        world
            .facade
            .create_place(Some(&ghost), place_request(&ghost, 1.0, 1.0)),
        Err(RentalError::NotFound {
            kind: EntityKind::User,
            ..
        })
    ));
    assert!(matches!(
        world
            .facade
            .create_place(None, place_request(&world.owner, 1.0, 1.0)),
        Err(RentalError::Unauthorized(DenyReason::Anonymous))
    ));
}

#[test]
fn place_amenities_resolve_by_id_or_name() {
    let world = world();
    let wifi = world
        .facade
        .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Wi-Fi" })))
        .expect("wifi");
    let parking = world
        .facade
        .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Parking" })))
        .expect("parking");

    let mut request = place_request(&world.guest, -33.86, 151.2);
    request.amenities = vec![wifi.id().to_string(), "Parking".to_string()];
    let place = world
        .facade
        .create_place(Some(&world.guest), request)
        .expect("place with amenities");
    assert!(place.has_amenity(&wifi.id()));
    assert!(place.has_amenity(&parking.id()));

    let mut request = place_request(&world.guest, -33.0, 151.0);
    request.amenities = vec!["Helipad".to_string()];
    match world.facade.create_place(Some(&world.guest), request) {
        Err(RentalError::NotFound { kind, id }) => {
            assert_eq!(kind, EntityKind::Amenity);
            assert_eq!(id, "Helipad");
        }
        other => panic!("expected unresolved amenity, got {other:?}"),
    }
}

#[test]
fn place_updates_accept_amenity_names() {
    let world = world();
    let wifi = world
        .facade
        .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Wi-Fi" })))
        .expect("wifi");
    let parking = world
        .facade
        .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Parking" })))
        .expect("parking");

    let updated = world
        .facade
        .update_place(
            Some(&world.owner),
            &world.place_id(),
            &attrs(json!({ "amenities": ["Wi-Fi", parking.id().to_string()] })),
        )
        .expect("owner lists amenities by name and id");
    assert!(updated.has_amenity(&wifi.id()));
    assert!(updated.has_amenity(&parking.id()));

    match world.facade.update_place(
        Some(&world.owner),
        &world.place_id(),
        &attrs(json!({ "amenities": ["Helipad"] })),
    ) {
        Err(RentalError::NotFound { kind, id }) => {
            assert_eq!(kind, EntityKind::Amenity);
            assert_eq!(id, "Helipad");
        }
        other => panic!("expected unresolved amenity, got {other:?}"),
    }
    let unchanged = world.facade.get_place(&world.place_id()).expect("place");
    assert_eq!(unchanged.amenities().len(), 2);
}

#[test]
fn attaching_amenities_is_owner_only_and_idempotent() {
    let world = world();
    let wifi = world
        .facade
        .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Wi-Fi" })))
        .expect("wifi");

    assert!(matches!(
        world
            .facade
            .add_amenity_to_place(Some(&world.guest), &world.place_id(), "Wi-Fi"),
        Err(RentalError::Unauthorized(DenyReason::NotOwner("place")))
    ));

    let attached = world
        .facade
        .add_amenity_to_place(Some(&world.owner), &world.place_id(), "Wi-Fi")
        .expect("owner attaches");
    let again = world
        .facade
        .add_amenity_to_place(Some(&world.owner), &world.place_id(), &wifi.id().to_string())
        .expect("second attach");
    assert_eq!(again.amenities().len(), 1);
    assert_eq!(again.updated_at(), attached.updated_at());

    let details = world
        .facade
        .get_place_details(&world.place_id())
        .expect("details");
    assert_eq!(details.owner.id, world.owner.subject);
    assert_eq!(details.owner.email, "olive@hbnb.io");
    assert_eq!(details.amenities, vec![wifi]);
}

#[test]
fn non_owner_update_is_denied_and_admin_update_succeeds() {
    let world = world();
    let changes = attrs(json!({ "price": 150 }));

    assert!(matches!(
        world
            .facade
            .update_place(Some(&world.guest), &world.place_id(), &changes),
        Err(RentalError::Unauthorized(_))
    ));

    let updated = world
        .facade
        .update_place(Some(&world.admin), &world.place_id(), &changes)
        .expect("admin update");
    assert_eq!(updated.price(), 150.0);
    assert_eq!(updated.owner_id(), world.owner.subject);
    assert!(updated.updated_at() > world.place.updated_at());
}

#[test]
fn owner_id_updates_are_always_immutable_field_failures() {
    let world = world();
    let changes = attrs(json!({ "owner_id": world.guest.subject.to_string() }));

    for caller in [Some(&world.admin), Some(&world.owner), Some(&world.guest), None] {
        match world.facade.update_place(caller, &world.place_id(), &changes) {
            Err(RentalError::ImmutableField { field }) => assert_eq!(field, "owner_id"),
            other => panic!("expected immutable field failure, got {other:?}"),
        }
    }
}

#[test]
fn moving_a_place_onto_another_is_a_duplicate() {
    let world = world();
    let other = world
        .facade
        .create_place(Some(&world.guest), place_request(&world.guest, 0.0, 0.0))
        .expect("second place");

    assert!(matches!(
        world.facade.update_place(
            Some(&world.guest),
            &other.id(),
            &attrs(json!({ "latitude": 48.85, "longitude": 2.35 })),
        ),
        Err(RentalError::Duplicate { .. })
    ));
    assert_eq!(
        world.facade.get_place(&other.id()).expect("unchanged").location(),
        (0.0, 0.0)
    );
}

#[test]
fn self_review_and_double_review_are_conflicts() {
    let world = world();

    assert!(matches!(
        world.facade.create_review(
            Some(&world.owner),
            review_request(&world.owner, &world.place_id(), 5)
        ),
        Err(RentalError::Conflict(_))
    ));

    let review = world
        .facade
        .create_review(
            Some(&world.guest),
            review_request(&world.guest, &world.place_id(), 4),
        )
        .expect("guest reviews");
    assert_eq!(review.rating(), 4);

    assert!(matches!(
        world.facade.create_review(
            Some(&world.guest),
            review_request(&world.guest, &world.place_id(), 3)
        ),
        Err(RentalError::Conflict(_))
    ));

    let for_place = world
        .facade
        .get_reviews_for_place(&world.place_id())
        .expect("reviews for place");
    assert_eq!(for_place, vec![review]);
}

#[test]
fn reviews_need_existing_targets_valid_ratings_and_the_callers_name() {
    let world = world();

    assert!(matches!(
        world.facade.create_review(
            Some(&world.guest),
            review_request(&world.guest, &EntityId::generate(), 4)
        ),
        Err(RentalError::NotFound {
            kind: EntityKind::Place,
            ..
        })
    ));
    for rating in [0, 6] {
        assert!(matches!(
            world.facade.create_review(
                Some(&world.guest),
                review_request(&world.guest, &world.place_id(), rating)
            ),
            Err(RentalError::Validation { field: "rating", .. })
        ));
    }
    assert!(matches!(
        world.facade.create_review(
            Some(&world.admin),
            review_request(&world.guest, &world.place_id(), 4)
        ),
        Err(RentalError::Unauthorized(DenyReason::ForeignAuthor))
    ));
    assert!(matches!(
        world.facade.get_reviews_for_place(&EntityId::generate()),
        Err(RentalError::NotFound { .. })
    ));
}

#[test]
fn review_updates_and_deletes_follow_ownership() {
    let world = world();
    let review = world
        .facade
        .create_review(
            Some(&world.guest),
            review_request(&world.guest, &world.place_id(), 4),
        )
        .expect("guest reviews");

    assert!(matches!(
        world.facade.update_review(
            Some(&world.owner),
            &review.id(),
            &attrs(json!({ "rating": 1 }))
        ),
        Err(RentalError::Unauthorized(_))
    ));
    let updated = world
        .facade
        .update_review(
            Some(&world.guest),
            &review.id(),
            &attrs(json!({ "rating": 5, "text": "Even better" })),
        )
        .expect("author updates");
    assert_eq!(updated.rating(), 5);
    assert_eq!(updated.text(), "Even better");

    assert!(matches!(
        world.facade.delete_review(Some(&world.owner), &review.id()),
        Err(RentalError::Unauthorized(_))
    ));
    world
        .facade
        .delete_review(Some(&world.admin), &review.id())
        .expect("admin deletes");
    assert!(matches!(
        world.facade.delete_review(Some(&world.admin), &review.id()),
        Err(RentalError::NotFound {
            kind: EntityKind::Review,
            ..
        })
    ));
    assert!(world.facade.get_all_reviews().expect("list").is_empty());
}

#[test]
fn amenity_names_are_unique_and_access_is_configurable() {
    let world = world();
    let wifi = world
        .facade
        .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Wi-Fi" })))
        .expect("wifi");

    assert!(matches!(
        world
            .facade
            .create_amenity(Some(&world.admin), &attrs(json!({ "name": "Wi-Fi" }))),
        Err(RentalError::Duplicate {
            kind: EntityKind::Amenity,
            ..
        })
    ));
    assert!(matches!(
        world
            .facade
            .create_amenity(Some(&world.guest), &attrs(json!({ "name": "Sauna" }))),
        Err(RentalError::Unauthorized(DenyReason::AdminRequired))
    ));

    let renamed = world
        .facade
        .update_amenity(
            Some(&world.admin),
            &wifi.id(),
            &attrs(json!({ "name": "Wi-Fi" })),
        )
        .expect("renaming to its own name is fine");
    assert_eq!(
        world
            .facade
            .get_amenity_by_name("Wi-Fi")
            .expect("lookup")
            .map(|amenity| amenity.id()),
        Some(renamed.id())
    );

    let open = world_with(AccessConfig {
        amenity_access: AmenityAccess::AnyAuthenticated,
        ..AccessConfig::default()
    });
    assert!(open
        .facade
        .create_amenity(Some(&open.guest), &attrs(json!({ "name": "Sauna" })))
        .is_ok());
}

#[test]
fn reads_report_missing_entities() {
    let world = world();
    let missing = EntityId::generate();
    assert!(matches!(
        world.facade.get_user(&missing),
        Err(RentalError::NotFound {
            kind: EntityKind::User,
            ..
        })
    ));
    assert!(matches!(
        world.facade.get_amenity(&missing),
        Err(RentalError::NotFound { .. })
    ));
    assert!(matches!(
        world.facade.get_review(&missing),
        Err(RentalError::NotFound { .. })
    ));
    assert_eq!(world.facade.get_all_users().expect("users").len(), 3);
    assert_eq!(world.facade.get_all_places().expect("places").len(), 1);
}
