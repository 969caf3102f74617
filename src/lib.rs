//! Storefront API Library
//!
//! This crate provides the core functionality for the storefront API:
//! catalog, cart, checkout, orders, returns, reviews, and vendor reports.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AuthRouterExt;
use crate::entities::Role;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Builds the `/api/v1` router. Role enforcement happens here, in the
/// route-guard layer, not inside handler bodies.
pub fn api_v1_routes() -> Router<AppState> {
    // Vendor-gated groups
    let vendor_products = handlers::products::vendor_routes().with_role(Role::Vendor);
    let vendor_dashboard = handlers::vendor::routes().with_role(Role::Vendor);
    let order_status = handlers::orders::status_routes().with_role(Role::Vendor);
    let returns_moderation = handlers::returns::routes().with_role(Role::Vendor);

    // Admin-gated groups
    let admin_categories = handlers::categories::admin_routes().with_role(Role::Admin);
    let admin_dashboard = handlers::vendor::admin_routes().with_role(Role::Admin);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Catalog
        .nest(
            "/products",
            handlers::products::public_routes().merge(vendor_products),
        )
        .nest(
            "/categories",
            handlers::categories::public_routes().merge(admin_categories),
        )
        // Cart and checkout
        .nest("/cart", handlers::carts::routes())
        .nest("/checkout", handlers::checkout::routes())
        // Orders and returns
        .nest("/orders", handlers::orders::routes().merge(order_status))
        .nest("/returns", returns_moderation)
        // Addresses
        .nest("/addresses", handlers::addresses::routes())
        // Dashboards
        .nest("/vendor", vendor_dashboard)
        .nest("/admin", admin_dashboard)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "storefront-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
