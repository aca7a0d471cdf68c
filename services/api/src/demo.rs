use crate::infra::build_facade;
use clap::Args;
use hbnb::config::{AccessConfig, AmenityAccess, StorageBackend, StorageConfig};
use hbnb::error::AppError;
use hbnb::rentals::{
    Attributes, CallerIdentity, Entity, EntityId, PlaceRequest, RentalError, RentalFacade,
    ReviewRequest, UserRequest,
};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Persist the demo data as JSON documents in this directory instead of memory.
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Let any registered user manage amenities.
    #[arg(long)]
    pub(crate) open_amenities: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        data_dir,
        open_amenities,
    } = args;

    let storage = match data_dir {
        Some(data_dir) => StorageConfig {
            backend: StorageBackend::JsonFiles,
            data_dir,
        },
        None => StorageConfig::default(),
    };
    let access = AccessConfig {
        amenity_access: if open_amenities {
            AmenityAccess::AnyAuthenticated
        } else {
            AmenityAccess::AdminOnly
        },
        ..AccessConfig::default()
    };
    let facade = build_facade(&storage, access)?;

    println!("HBnB rental demo ({:?} storage)", storage.backend);
    walkthrough(&facade)?;
    Ok(())
}

fn walkthrough(facade: &RentalFacade) -> Result<(), RentalError> {
    let admin = facade.create_user(None, demo_user("Ada", "ada@hbnb.demo"))?;
    let admin = CallerIdentity::of(&admin);
    println!("- Bootstrap user {} registered as admin", admin.subject);

    let host = facade.create_user(Some(&admin), demo_user("Hugo", "hugo@hbnb.demo"))?;
    let host = CallerIdentity::of(&host);
    let guest = facade.create_user(Some(&admin), demo_user("Gia", "gia@hbnb.demo"))?;
    let guest = CallerIdentity::of(&guest);
    println!("- Host {} and guest {} registered", host.subject, guest.subject);

    let login = facade.authenticate("HUGO@hbnb.demo", "Hugo-demo-password")?;
    println!("- Host logged in (admin: {})", login.is_admin);

    let wifi = facade.create_amenity(Some(&admin), &object(json!({ "name": "Wi-Fi" })))?;
    println!("- Amenity '{}' created by admin", wifi.name());
    report(
        "Guest creating an amenity",
        facade.create_amenity(Some(&guest), &object(json!({ "name": "Sauna" }))),
    );

    let place = facade.create_place(
        Some(&host),
        PlaceRequest {
            attributes: object(json!({
                "title": "Harbour studio",
                "description": "Balcony over the marina",
                "price": 95.5,
                "latitude": 41.38,
                "longitude": 2.17,
            })),
            owner_id: host.subject.to_string(),
            amenities: vec!["Wi-Fi".to_string()],
        },
    )?;
    println!(
        "- Place '{}' listed at {:?} for {:.2}",
        place.title(),
        place.location(),
        place.price()
    );
    report(
        "Guest listing a second place at the same coordinates",
        facade.create_place(
            Some(&guest),
            PlaceRequest {
                attributes: object(json!({
                    "title": "Copycat",
                    "price": 50,
                    "latitude": 41.38,
                    "longitude": 2.17,
                })),
                owner_id: guest.subject.to_string(),
                amenities: Vec::new(),
            },
        ),
    );

    report(
        "Host reviewing their own place",
        facade.create_review(Some(&host), demo_review(&host, &place.id(), 5)),
    );
    let review = facade.create_review(Some(&guest), demo_review(&guest, &place.id(), 4))?;
    println!("- Guest reviewed the place ({} stars)", review.rating());
    report(
        "Guest reviewing the same place twice",
        facade.create_review(Some(&guest), demo_review(&guest, &place.id(), 3)),
    );

    let raise = object(json!({ "price": 120 }));
    report(
        "Guest changing the host's price",
        facade.update_place(Some(&guest), &place.id(), &raise),
    );
    let updated = facade.update_place(Some(&admin), &place.id(), &raise)?;
    println!("- Admin raised the price to {:.2}", updated.price());
    report(
        "Admin reassigning the owner",
        facade.update_place(
            Some(&admin),
            &place.id(),
            &object(json!({ "owner_id": guest.subject.to_string() })),
        ),
    );

    let details = facade.get_place_details(&place.id())?;
    println!(
        "- Details: owned by {} {} | amenities: {}",
        details.owner.first_name,
        details.owner.last_name,
        details
            .amenities
            .iter()
            .map(|amenity| amenity.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    facade.delete_review(Some(&guest), &review.id())?;
    report(
        "Deleting the same review again",
        facade.delete_review(Some(&guest), &review.id()),
    );
    println!(
        "- Review deleted; {} review(s) left for the place",
        facade.get_reviews_for_place(&place.id())?.len()
    );
    Ok(())
}

fn report<T>(label: &str, outcome: Result<T, RentalError>) {
    match outcome {
        Ok(_) => println!("  {label}: allowed"),
        Err(err) => println!("  {label}: rejected ({err})"),
    }
}

fn object(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

fn demo_user(first_name: &str, email: &str) -> UserRequest {
    UserRequest {
        attributes: object(json!({
            "first_name": first_name,
            "last_name": "Demo",
            "email": email,
        })),
        password: format!("{first_name}-demo-password"),
        is_admin: None,
    }
}

fn demo_review(author: &CallerIdentity, place_id: &EntityId, rating: u8) -> ReviewRequest {
    ReviewRequest {
        attributes: object(json!({ "text": "Bright and quiet", "rating": rating })),
        user_id: author.subject.to_string(),
        place_id: place_id.to_string(),
    }
}
