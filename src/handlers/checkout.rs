use crate::handlers::common::{created_response, map_service_error};
use crate::{
    auth::AuthUser,
    db::{self, RetryPolicy},
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(place_order))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: Uuid,
}

/// Places an order from the caller's cart. The whole write chain runs in
/// one transaction; transient storage failures are retried with backoff
/// before surfacing, and a retried attempt can never observe a partial
/// write from an earlier one.
async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let policy = RetryPolicy::from(&state.config);
    let outcome = db::with_retry(policy, || {
        state.services.checkout.place_order(&user, payload.address_id)
    })
    .await
    .map_err(map_service_error)?;

    Ok(created_response(outcome))
}
