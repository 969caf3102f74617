use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

/// Category creation; mounted behind the admin role guard.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/", post(create_category))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(categories))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let category = state
        .services
        .catalog
        .create_category(&payload.name)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(category))
}
