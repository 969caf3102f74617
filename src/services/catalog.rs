use crate::{
    auth::AuthUser,
    entities::{
        category, order_item, product, review, store, user, Category, CategoryModel, OrderItem,
        Product, ProductModel, ProductStatus, Review, Store, User,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::reviews::{summarize_ratings, RatingSummary},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Fixed price-range buckets offered by the catalog filter UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceBand {
    /// price ≤ 50 000
    #[serde(rename = "under-50k")]
    Under50k,
    /// 50 000 ≤ price ≤ 150 000
    #[serde(rename = "50k-150k")]
    Mid50kTo150k,
    /// price ≥ 150 000
    #[serde(rename = "over-150k")]
    Over150k,
}

impl PriceBand {
    fn bounds(self) -> (Option<Decimal>, Option<Decimal>) {
        match self {
            PriceBand::Under50k => (None, Some(Decimal::from(50_000))),
            PriceBand::Mid50kTo150k => {
                (Some(Decimal::from(50_000)), Some(Decimal::from(150_000)))
            }
            PriceBand::Over150k => (Some(Decimal::from(150_000)), None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
}

/// Catalog search parameters. Everything is optional; the default is
/// "all active products, newest first".
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category_slug: Option<String>,
    pub band: Option<PriceBand>,
    pub query: Option<String>,
    pub sort: SortKey,
    pub include_hidden: bool,
    pub page: u64,
    pub per_page: u64,
}

/// A catalog hit decorated with its seller display name and aggregate
/// rating.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: ProductModel,
    pub seller_name: Option<String>,
    pub rating: Option<RatingSummary>,
}

/// What `delete_product` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    /// The product has order history, so the row stays and is hidden.
    Hidden,
    /// No orders reference it; the row is gone.
    Removed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Uuid,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<Option<String>>,
}

/// Catalog reads plus vendor-side product CRUD.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Searches active products with the given filters and decorates each
    /// hit with seller name and aggregate rating. Returns the page plus
    /// the total match count.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        filter: &CatalogFilter,
    ) -> Result<(Vec<ProductSummary>, u64), ServiceError> {
        let mut query = Product::find();

        if !filter.include_hidden {
            query = query.filter(product::Column::Status.eq(ProductStatus::Active));
        }

        if let Some(slug) = &filter.category_slug {
            let cat = Category::find()
                .filter(category::Column::Slug.eq(slug.clone()))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Category '{}' not found", slug))
                })?;
            query = query.filter(product::Column::CategoryId.eq(cat.id));
        }

        if let Some(band) = filter.band {
            let (min, max) = band.bounds();
            if let Some(min) = min {
                query = query.filter(product::Column::Price.gte(min));
            }
            if let Some(max) = max {
                query = query.filter(product::Column::Price.lte(max));
            }
        }

        if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Title,
                        ))))
                        .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Description,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        query = match filter.sort {
            SortKey::PriceAsc => query.order_by_asc(product::Column::Price),
            SortKey::PriceDesc => query.order_by_desc(product::Column::Price),
            SortKey::Newest => query.order_by_desc(product::Column::CreatedAt),
        };

        let per_page = filter.per_page.clamp(1, 100);
        let page = filter.page.max(1);
        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        let summaries = self.decorate(products).await?;
        Ok((summaries, total))
    }

    /// Fetches one product with decoration. Inactive products are visible
    /// only to their owner or an admin.
    #[instrument(skip(self, requester))]
    pub async fn get_product(
        &self,
        product_id: Uuid,
        requester: Option<&AuthUser>,
    ) -> Result<ProductSummary, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.status == ProductStatus::Inactive {
            let allowed = requester
                .map(|u| u.can_act_for(product.vendor_id))
                .unwrap_or(false);
            if !allowed {
                return Err(ServiceError::NotFound(format!(
                    "Product {} not found",
                    product_id
                )));
            }
        }

        let mut summaries = self.decorate(vec![product]).await?;
        Ok(summaries.remove(0))
    }

    async fn decorate(
        &self,
        products: Vec<ProductModel>,
    ) -> Result<Vec<ProductSummary>, ServiceError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let vendor_ids: Vec<Uuid> = products.iter().map(|p| p.vendor_id).collect();
        let product_ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();

        let vendor_names: HashMap<Uuid, String> = User::find()
            .filter(user::Column::Id.is_in(vendor_ids.clone()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        // A store name, when the vendor has one, wins over the personal name.
        let store_names: HashMap<Uuid, String> = Store::find()
            .filter(store::Column::VendorId.is_in(vendor_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.vendor_id, s.name))
            .collect();

        let mut ratings_by_product: HashMap<Uuid, Vec<i16>> = HashMap::new();
        let rating_rows: Vec<(Uuid, i16)> = Review::find()
            .select_only()
            .column(review::Column::ProductId)
            .column(review::Column::Rating)
            .filter(review::Column::ProductId.is_in(product_ids))
            .into_tuple()
            .all(&*self.db)
            .await?;
        for (pid, rating) in rating_rows {
            ratings_by_product.entry(pid).or_default().push(rating);
        }

        Ok(products
            .into_iter()
            .map(|p| {
                let seller_name = store_names
                    .get(&p.vendor_id)
                    .or_else(|| vendor_names.get(&p.vendor_id))
                    .cloned();
                let rating = ratings_by_product
                    .get(&p.id)
                    .map(|rs| summarize_ratings(rs))
                    .unwrap_or(None);
                ProductSummary {
                    seller_name,
                    rating,
                    product: p,
                }
            })
            .collect())
    }

    /// Creates a product owned by the requesting vendor.
    #[instrument(skip(self, requester, input), fields(vendor_id = %requester.id))]
    pub async fn create_product(
        &self,
        requester: &AuthUser,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if input.title.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "title must not be empty".to_string(),
            ));
        }
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be positive".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::ValidationError(
                "stock must not be negative".to_string(),
            ));
        }
        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", input.category_id))
            })?;

        let now = Utc::now();
        let status = if input.stock == 0 {
            ProductStatus::SoldOut
        } else {
            ProductStatus::Active
        };
        let stored = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            status: Set(status),
            vendor_id: Set(requester.id),
            category_id: Set(input.category_id),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(stored.id))
            .await;
        info!(product_id = %stored.id, "product created");
        Ok(stored)
    }

    /// Updates a product; only its owner (or an admin) may.
    #[instrument(skip(self, requester, input))]
    pub async fn update_product(
        &self,
        requester: &AuthUser,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let existing = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !requester.can_act_for(existing.vendor_id) {
            return Err(ServiceError::Forbidden(
                "product belongs to another vendor".to_string(),
            ));
        }

        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must be positive".to_string(),
                ));
            }
        }
        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock must not be negative".to_string(),
                ));
            }
        }
        if let Some(category_id) = input.category_id {
            Category::find_by_id(category_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Category {} not found", category_id))
                })?;
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(title) = input.title {
            if title.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "title must not be empty".to_string(),
                ));
            }
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(image_url);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }

    /// Deletes a product; only its owner (or an admin) may. A product
    /// referenced by order history is hidden instead of removed, so the
    /// immutable order lines keep a valid reference.
    #[instrument(skip(self, requester))]
    pub async fn delete_product(
        &self,
        requester: &AuthUser,
        product_id: Uuid,
    ) -> Result<ProductRemoval, ServiceError> {
        let existing = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !requester.can_act_for(existing.vendor_id) {
            return Err(ServiceError::Forbidden(
                "product belongs to another vendor".to_string(),
            ));
        }

        let referenced = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;

        let removal = if referenced > 0 {
            let mut active: product::ActiveModel = existing.into();
            active.status = Set(ProductStatus::Inactive);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
            ProductRemoval::Hidden
        } else {
            Product::delete_by_id(product_id).exec(&*self.db).await?;
            ProductRemoval::Removed
        };

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        info!(%product_id, ?removal, "product deleted");
        Ok(removal)
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        let categories = Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(categories)
    }

    /// Creates a category with a slug derived from the name.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<CategoryModel, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "category name must not be empty".to_string(),
            ));
        }

        let stored = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slugify(name)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::Conflict(format!("category '{}' already exists", name))
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(stored.id))
            .await;
        Ok(stored)
    }
}

/// Lowercases and collapses anything non-alphanumeric into single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
