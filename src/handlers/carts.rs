use crate::handlers::common::{
    map_service_error, no_content_response, success_response, validate_input,
};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Cart endpoints; every route requires an authenticated user.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/", delete(clear_cart))
        .route("/items", put(set_item))
        .route("/items/:product_id", delete(remove_item))
}

/// Priced view of the caller's cart.
async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get_cart(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetCartItemRequest {
    pub product_id: Uuid,
    /// Replace semantics: the line ends up with exactly this quantity;
    /// 0 removes the line.
    #[validate(range(min = 0))]
    pub quantity: i32,
}

async fn set_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SetCartItemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .cart
        .set_item(user.id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    let cart = state
        .services
        .cart
        .get_cart(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(user.id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .cart
        .clear(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
