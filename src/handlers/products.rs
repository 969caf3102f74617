use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    auth::AuthUser,
    db::{self, RetryPolicy},
    errors::ApiError,
    services::catalog::{
        CatalogFilter, CreateProductInput, PriceBand, SortKey, UpdateProductInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Public catalog endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/reviews", get(list_reviews))
        .route("/:id/reviews", post(create_review))
}

/// Vendor-side product management; mounted behind the vendor role guard.
pub fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
    pub band: Option<PriceBand>,
    pub q: Option<String>,
    pub sort: Option<SortKey>,
    #[serde(default)]
    pub include_hidden: bool,
}

/// List/search active products with filtering, sorting, and pagination.
async fn list_products(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(params): Query<ListProductsQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    // Hidden products are only shown to vendor/admin callers.
    let include_hidden = params.include_hidden
        && user
            .as_ref()
            .map(|u| u.role.satisfies(crate::entities::Role::Vendor))
            .unwrap_or(false);

    let filter = CatalogFilter {
        category_slug: params.category,
        band: params.band,
        query: params.q,
        sort: params.sort.unwrap_or_default(),
        include_hidden,
        page: pagination.page,
        per_page: pagination.per_page,
    };

    let (products, total) = state
        .services
        .catalog
        .search(&filter)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products,
        filter.page.max(1),
        filter.per_page.clamp(1, 100),
        total,
    )))
}

/// Fetch one product with seller and rating decoration.
async fn get_product(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id, user.as_ref())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
    pub category_id: Uuid,
    pub image_url: Option<String>,
}

async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(
            &user,
            CreateProductInput {
                title: payload.title,
                description: payload.description,
                price: payload.price,
                stock: payload.stock,
                category_id: payload.category_id,
                image_url: payload.image_url,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub status: Option<crate::entities::ProductStatus>,
    pub category_id: Option<Uuid>,
    /// An empty string clears the image.
    pub image_url: Option<String>,
}

async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(
            &user,
            id,
            UpdateProductInput {
                title: payload.title,
                description: payload.description,
                price: payload.price,
                stock: payload.stock,
                status: payload.status,
                category_id: payload.category_id,
                image_url: payload
                    .image_url
                    .map(|url| if url.is_empty() { None } else { Some(url) }),
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let removal = state
        .services
        .catalog
        .delete_product(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({ "result": removal })))
}

/// List a product's reviews with the aggregate rating.
async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reviews = state
        .services
        .reviews
        .list_for_product(id)
        .await
        .map_err(map_service_error)?;
    let summary = state
        .services
        .reviews
        .rating_summary(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "rating": summary,
        "reviews": reviews,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    pub comment: String,
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let policy = RetryPolicy::from(&state.config);
    let review = db::with_retry(policy, || {
        state
            .services
            .reviews
            .submit(&user, id, payload.rating, &payload.comment)
    })
    .await
    .map_err(map_service_error)?;

    Ok(created_response(review))
}
