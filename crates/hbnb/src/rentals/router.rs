use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Attributes, EntityId, EntityKind, User, UserView};
use super::policy::{CallerIdentity, DenyReason};
use super::service::{PlaceRequest, RentalError, RentalFacade, ReviewRequest, UserRequest};

/// Header carrying the authenticated subject id, set by the gateway in front of the service.
pub const CALLER_HEADER: &str = "x-user-id";

type Facade = State<Arc<RentalFacade>>;

/// Router builder exposing the rental API.
pub fn rental_router(facade: Arc<RentalFacade>) -> Router {
    Router::new()
        .route("/api/v1/users", post(create_user).get(list_users))
        .route("/api/v1/users/:user_id", get(get_user).put(update_user))
        .route("/api/v1/auth/login", post(login))
        .route(
            "/api/v1/amenities",
            post(create_amenity).get(list_amenities),
        )
        .route(
            "/api/v1/amenities/:amenity_id",
            get(get_amenity).put(update_amenity),
        )
        .route("/api/v1/places", post(create_place).get(list_places))
        .route("/api/v1/places/:place_id", get(get_place).put(update_place))
        .route("/api/v1/places/:place_id/amenities", post(attach_amenity))
        .route("/api/v1/places/:place_id/reviews", get(place_reviews))
        .route("/api/v1/reviews", post(create_review).get(list_reviews))
        .route(
            "/api/v1/reviews/:review_id",
            get(get_review).put(update_review).delete(delete_review),
        )
        .with_state(facade)
}

impl IntoResponse for RentalError {
    fn into_response(self) -> Response {
        let status = match &self {
            RentalError::Validation { .. } | RentalError::TypeMismatch { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RentalError::ImmutableField { .. } => StatusCode::BAD_REQUEST,
            RentalError::NotFound { .. } => StatusCode::NOT_FOUND,
            RentalError::Duplicate { .. } | RentalError::Conflict(_) => StatusCode::CONFLICT,
            RentalError::Unauthorized(_) => StatusCode::FORBIDDEN,
            RentalError::Storage(_) | RentalError::Credential(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

fn caller(facade: &RentalFacade, headers: &HeaderMap) -> Result<Option<CallerIdentity>, RentalError> {
    let Some(raw) = headers.get(CALLER_HEADER) else {
        return Ok(None);
    };
    let subject = raw
        .to_str()
        .ok()
        .and_then(|value| value.parse::<EntityId>().ok())
        .ok_or(DenyReason::UnknownCaller)?;
    facade.resolve_caller(&subject).map(Some)
}

fn path_id(kind: EntityKind, raw: &str) -> Result<EntityId, RentalError> {
    raw.parse().map_err(|_| RentalError::not_found(kind, raw))
}

fn user_views(users: Vec<User>) -> Vec<UserView> {
    users.iter().map(|user| user.view()).collect()
}

pub(crate) async fn create_user(
    State(facade): Facade,
    headers: HeaderMap,
    Json(request): Json<UserRequest>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let user = facade.create_user(caller.as_ref(), request)?;
    Ok((StatusCode::CREATED, Json(user.view())).into_response())
}

async fn list_users(State(facade): Facade) -> Result<Json<Vec<UserView>>, RentalError> {
    Ok(Json(user_views(facade.get_all_users()?)))
}

async fn get_user(
    State(facade): Facade,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>, RentalError> {
    let id = path_id(EntityKind::User, &user_id)?;
    Ok(Json(facade.get_user(&id)?.view()))
}

async fn update_user(
    State(facade): Facade,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(changes): Json<Attributes>,
) -> Result<Json<UserView>, RentalError> {
    let caller = caller(&facade, &headers)?;
    let id = path_id(EntityKind::User, &user_id)?;
    Ok(Json(facade.update_user(caller.as_ref(), &id, &changes)?.view()))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(facade): Facade,
    Json(request): Json<LoginRequest>,
) -> Result<Json<CallerIdentity>, RentalError> {
    Ok(Json(facade.authenticate(&request.email, &request.password)?))
}

async fn create_amenity(
    State(facade): Facade,
    headers: HeaderMap,
    Json(attributes): Json<Attributes>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let amenity = facade.create_amenity(caller.as_ref(), &attributes)?;
    Ok((StatusCode::CREATED, Json(amenity)).into_response())
}

async fn list_amenities(State(facade): Facade) -> Result<Response, RentalError> {
    Ok(Json(facade.get_all_amenities()?).into_response())
}

async fn get_amenity(
    State(facade): Facade,
    Path(amenity_id): Path<String>,
) -> Result<Response, RentalError> {
    let id = path_id(EntityKind::Amenity, &amenity_id)?;
    Ok(Json(facade.get_amenity(&id)?).into_response())
}

async fn update_amenity(
    State(facade): Facade,
    headers: HeaderMap,
    Path(amenity_id): Path<String>,
    Json(changes): Json<Attributes>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let id = path_id(EntityKind::Amenity, &amenity_id)?;
    Ok(Json(facade.update_amenity(caller.as_ref(), &id, &changes)?).into_response())
}

async fn create_place(
    State(facade): Facade,
    headers: HeaderMap,
    Json(request): Json<PlaceRequest>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let place = facade.create_place(caller.as_ref(), request)?;
    Ok((StatusCode::CREATED, Json(place)).into_response())
}

async fn list_places(State(facade): Facade) -> Result<Response, RentalError> {
    Ok(Json(facade.get_all_places()?).into_response())
}

async fn get_place(
    State(facade): Facade,
    Path(place_id): Path<String>,
) -> Result<Response, RentalError> {
    let id = path_id(EntityKind::Place, &place_id)?;
    Ok(Json(facade.get_place_details(&id)?).into_response())
}

async fn update_place(
    State(facade): Facade,
    headers: HeaderMap,
    Path(place_id): Path<String>,
    Json(changes): Json<Attributes>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let id = path_id(EntityKind::Place, &place_id)?;
    Ok(Json(facade.update_place(caller.as_ref(), &id, &changes)?).into_response())
}

#[derive(Debug, Deserialize)]
struct AttachAmenityRequest {
    /// Amenity id or name.
    amenity: String,
}

async fn attach_amenity(
    State(facade): Facade,
    headers: HeaderMap,
    Path(place_id): Path<String>,
    Json(request): Json<AttachAmenityRequest>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let id = path_id(EntityKind::Place, &place_id)?;
    let place = facade.add_amenity_to_place(caller.as_ref(), &id, &request.amenity)?;
    Ok(Json(place).into_response())
}

async fn place_reviews(
    State(facade): Facade,
    Path(place_id): Path<String>,
) -> Result<Response, RentalError> {
    let id = path_id(EntityKind::Place, &place_id)?;
    Ok(Json(facade.get_reviews_for_place(&id)?).into_response())
}

async fn create_review(
    State(facade): Facade,
    headers: HeaderMap,
    Json(request): Json<ReviewRequest>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let review = facade.create_review(caller.as_ref(), request)?;
    Ok((StatusCode::CREATED, Json(review)).into_response())
}

async fn list_reviews(State(facade): Facade) -> Result<Response, RentalError> {
    Ok(Json(facade.get_all_reviews()?).into_response())
}

async fn get_review(
    State(facade): Facade,
    Path(review_id): Path<String>,
) -> Result<Response, RentalError> {
    let id = path_id(EntityKind::Review, &review_id)?;
    Ok(Json(facade.get_review(&id)?).into_response())
}

async fn update_review(
    State(facade): Facade,
    headers: HeaderMap,
    Path(review_id): Path<String>,
    Json(changes): Json<Attributes>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let id = path_id(EntityKind::Review, &review_id)?;
    Ok(Json(facade.update_review(caller.as_ref(), &id, &changes)?).into_response())
}

async fn delete_review(
    State(facade): Facade,
    headers: HeaderMap,
    Path(review_id): Path<String>,
) -> Result<Response, RentalError> {
    let caller = caller(&facade, &headers)?;
    let id = path_id(EntityKind::Review, &review_id)?;
    facade.delete_review(caller.as_ref(), &id)?;
    Ok(Json(json!({ "message": "review deleted" })).into_response())
}
