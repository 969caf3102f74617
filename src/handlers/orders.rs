use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{
    auth::AuthUser,
    db::{self, RetryPolicy},
    entities::{OrderStatus, ReturnReason},
    errors::ApiError,
    services::returns::SubmitReturnInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

/// Buyer-facing order endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/returns", get(list_returns))
        .route("/:id/returns", post(create_return))
}

/// Status transitions; mounted behind the vendor role guard.
pub fn status_routes() -> Router<AppState> {
    Router::new().route("/:id/status", put(update_status))
}

async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(&user)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .orders
        .get_order(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = OrderStatus::from_str(&payload.status).map_err(|_| {
        ApiError::ValidationError(format!("'{}' is not a valid order status", payload.status))
    })?;

    let order = state
        .services
        .orders
        .update_status(id, status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
pub struct CreateReturnRequest {
    pub product_id: Uuid,
    pub reason_code: String,
    pub reason: String,
    pub comments: Option<String>,
}

async fn create_return(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReturnRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reason_code = ReturnReason::from_str(&payload.reason_code).map_err(|_| {
        ApiError::ValidationError(format!(
            "'{}' is not a valid return reason code",
            payload.reason_code
        ))
    })?;

    let input = SubmitReturnInput {
        product_id: payload.product_id,
        reason_code,
        reason: payload.reason,
        comments: payload.comments,
    };
    let policy = RetryPolicy::from(&state.config);
    let request = db::with_retry(policy, || {
        state.services.returns.submit(&user, id, input.clone())
    })
    .await
    .map_err(map_service_error)?;

    Ok(created_response(request))
}

async fn list_returns(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let requests = state
        .services
        .returns
        .list_for_order(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(requests))
}
