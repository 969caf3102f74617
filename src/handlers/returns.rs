use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Router,
};
use uuid::Uuid;

/// Return-request moderation; mounted behind the vendor role guard.
/// Stock was already adjusted when the request was submitted, so these
/// only move the request status.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:id/approve", post(approve_return))
        .route("/:id/reject", post(reject_return))
}

async fn approve_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let request = state
        .services
        .returns
        .approve(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(request))
}

async fn reject_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let request = state
        .services
        .returns
        .reject(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(request))
}
