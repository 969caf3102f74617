use crate::{
    entities::{
        order, order_item, product, review, Order, OrderItem, OrderStatus, Product, Review, User,
    },
    errors::ServiceError,
    services::reviews::{summarize_ratings, RatingSummary},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Vendor and admin aggregate reports. Pure reads; a vendor with no
/// products, orders, or reviews gets zeros and `None`, never an error.
#[derive(Clone)]
pub struct VendorService {
    db: Arc<DatabaseConnection>,
}

impl VendorService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn product_ids_of(&self, vendor_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let ids: Vec<Uuid> = Product::find()
            .select_only()
            .column(product::Column::Id)
            .filter(product::Column::VendorId.eq(vendor_id))
            .into_tuple()
            .all(&*self.db)
            .await?;
        Ok(ids)
    }

    /// Product count, distinct order count, revenue, and average rating
    /// for one vendor. Cancelled orders are excluded from the order and
    /// revenue figures.
    #[instrument(skip(self))]
    pub async fn vendor_stats(&self, vendor_id: Uuid) -> Result<VendorStats, ServiceError> {
        let product_ids = self.product_ids_of(vendor_id).await?;
        if product_ids.is_empty() {
            return Ok(VendorStats::default());
        }

        let line_rows: Vec<(Uuid, i32, Decimal)> = OrderItem::find()
            .select_only()
            .column(order_item::Column::OrderId)
            .column(order_item::Column::Quantity)
            .column(order_item::Column::UnitPrice)
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(order_item::Column::ProductId.is_in(product_ids.clone()))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .into_tuple()
            .all(&*self.db)
            .await?;

        let mut order_ids = HashSet::new();
        let mut revenue = Decimal::ZERO;
        for (order_id, quantity, unit_price) in &line_rows {
            order_ids.insert(*order_id);
            revenue += *unit_price * Decimal::from(*quantity);
        }

        let ratings: Vec<i16> = Review::find()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::ProductId.is_in(product_ids.clone()))
            .into_tuple()
            .all(&*self.db)
            .await?;
        let rating = summarize_ratings(&ratings);

        Ok(VendorStats {
            product_count: product_ids.len() as u64,
            order_count: order_ids.len() as u64,
            revenue,
            rating,
        })
    }

    /// The vendor's slice of each order touching their products: order
    /// header data plus only the lines for this vendor's products.
    #[instrument(skip(self))]
    pub async fn vendor_orders(&self, vendor_id: Uuid) -> Result<Vec<VendorOrderView>, ServiceError> {
        let product_ids = self.product_ids_of(vendor_id).await?;
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let lines = OrderItem::find()
            .filter(order_item::Column::ProductId.is_in(product_ids))
            .all(&*self.db)
            .await?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut lines_by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for line in lines {
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        let orders = Order::find()
            .filter(order::Column::Id.is_in(lines_by_order.keys().copied().collect::<Vec<_>>()))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(orders
            .into_iter()
            .map(|o| {
                let lines = lines_by_order.remove(&o.id).unwrap_or_default();
                VendorOrderView {
                    order_id: o.id,
                    status: o.status,
                    created_at: o.created_at,
                    lines,
                }
            })
            .collect())
    }

    /// Global totals for the admin dashboard.
    #[instrument(skip(self))]
    pub async fn admin_stats(&self) -> Result<AdminStats, ServiceError> {
        let user_count = User::find().count(&*self.db).await?;
        let product_count = Product::find().count(&*self.db).await?;
        let order_count = Order::find()
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .count(&*self.db)
            .await?;

        let totals: Vec<Decimal> = Order::find()
            .select_only()
            .column(order::Column::Total)
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .into_tuple()
            .all(&*self.db)
            .await?;
        let revenue = totals.into_iter().fold(Decimal::ZERO, |acc, t| acc + t);

        Ok(AdminStats {
            user_count,
            product_count,
            order_count,
            revenue,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct VendorStats {
    pub product_count: u64,
    pub order_count: u64,
    pub revenue: Decimal,
    pub rating: Option<RatingSummary>,
}

impl Default for VendorStats {
    fn default() -> Self {
        Self {
            product_count: 0,
            order_count: 0,
            revenue: Decimal::ZERO,
            rating: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VendorOrderView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<order_item::Model>,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub user_count: u64,
    pub product_count: u64,
    pub order_count: u64,
    pub revenue: Decimal,
}
