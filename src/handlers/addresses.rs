use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser, errors::ApiError, services::addresses::CreateAddressInput, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Address book endpoints; every route requires an authenticated user.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses))
        .route("/", post(create_address))
        .route("/:id/default", put(set_default))
        .route("/:id", delete(delete_address))
}

async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let addresses = state
        .services
        .addresses
        .list(&user)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(addresses))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 200))]
    pub recipient: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    pub phone: Option<String>,
    pub delivery_instructions: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let address = state
        .services
        .addresses
        .create(
            &user,
            CreateAddressInput {
                recipient: payload.recipient,
                street: payload.street,
                city: payload.city,
                region: payload.region,
                postal_code: payload.postal_code,
                country: payload.country,
                phone: payload.phone,
                delivery_instructions: payload.delivery_instructions,
                is_default: payload.is_default,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(address))
}

async fn set_default(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .set_default(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}

async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .addresses
        .delete(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
