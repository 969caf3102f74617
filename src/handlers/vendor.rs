use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{extract::State, routing::get, Router};

/// Vendor dashboard endpoints; mounted behind the vendor role guard.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(vendor_stats))
        .route("/orders", get(vendor_orders))
}

/// Admin dashboard endpoints; mounted behind the admin role guard.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/stats", get(admin_stats))
}

async fn vendor_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let stats = state
        .services
        .vendor
        .vendor_stats(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(stats))
}

async fn vendor_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .vendor
        .vendor_orders(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

async fn admin_stats(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let stats = state
        .services
        .vendor
        .admin_stats()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(stats))
}
