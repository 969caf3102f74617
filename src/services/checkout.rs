use crate::{
    auth::AuthUser,
    config::AppConfig,
    entities::{
        address, cart_item, order, order_item, product, Address, CartItem, OrderItem, OrderModel,
        OrderStatus, Product, ProductStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::price_lines,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Converts a cart into an order.
///
/// The whole chain — stock decrement, order insert, line snapshot, cart
/// clear — runs in one database transaction, so a failure at any step
/// leaves no partial order behind. Stock changes are conditional atomic
/// deltas (`stock = stock - q` guarded by `stock >= q`), never
/// read-modify-write, so concurrent checkouts cannot oversell.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    tax_rate: Decimal,
    shipping_flat_rate: Decimal,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            tax_rate: Decimal::from_f64_retain(config.tax_rate).unwrap_or_else(|| dec!(0.10)),
            shipping_flat_rate: Decimal::from_f64_retain(config.shipping_flat_rate)
                .unwrap_or(Decimal::ZERO),
        }
    }

    /// Places an order from the user's current cart.
    ///
    /// The total is recomputed server-side from current product prices;
    /// client-supplied totals are never accepted. Unit prices are
    /// snapshotted onto the order lines at this moment and never change
    /// afterwards.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn place_order(
        &self,
        user: &AuthUser,
        address_id: Uuid,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let cart_rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user.id))
            .find_also_related(Product)
            .all(&txn)
            .await?;

        if cart_rows.is_empty() {
            return Err(ServiceError::ValidationError("cart is empty".to_string()));
        }

        let shipping_address = Address::find_by_id(address_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        if shipping_address.user_id != user.id {
            return Err(ServiceError::Forbidden(
                "address belongs to another user".to_string(),
            ));
        }

        let now = Utc::now();
        let mut priced: Vec<(i32, Decimal)> = Vec::with_capacity(cart_rows.len());
        let mut snapshots = Vec::with_capacity(cart_rows.len());

        for (item, maybe_product) in &cart_rows {
            let product = maybe_product.as_ref().ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} is no longer available",
                    item.product_id
                ))
            })?;
            if product.status == ProductStatus::Inactive {
                return Err(ServiceError::ValidationError(format!(
                    "'{}' is no longer for sale",
                    product.title
                )));
            }

            // Conditional atomic decrement; zero rows affected means the
            // stock moved under us and the checkout must not proceed.
            let res = Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col((product::Entity, product::Column::Stock)).sub(item.quantity),
                )
                .filter(product::Column::Id.eq(product.id))
                .filter(product::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;
            if res.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "not enough stock of '{}' to complete the order",
                    product.title
                )));
            }

            // A drained product is hidden from the catalog until restocked.
            Product::update_many()
                .set(product::ActiveModel {
                    status: Set(ProductStatus::SoldOut),
                    updated_at: Set(now),
                    ..Default::default()
                })
                .filter(product::Column::Id.eq(product.id))
                .filter(product::Column::Stock.lte(0))
                .filter(product::Column::Status.eq(ProductStatus::Active))
                .exec(&txn)
                .await?;

            priced.push((item.quantity, product.price));
            snapshots.push((item.quantity, product.id, product.price));
        }

        let totals = price_lines(&priced, self.tax_rate, self.shipping_flat_rate);

        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user.id),
            address_id: Set(address_id),
            total: Set(totals.total),
            status: Set(OrderStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        OrderItem::insert_many(
            snapshots
                .iter()
                .map(|(quantity, product_id, unit_price)| order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(*product_id),
                    quantity: Set(*quantity),
                    unit_price: Set(*unit_price),
                    line_total: Set(*unit_price * Decimal::from(*quantity)),
                })
                .collect::<Vec<_>>(),
        )
        .exec(&txn)
        .await?;

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                user_id: user.id,
            })
            .await;

        info!(%order_id, total = %order_model.total, "order placed");

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(CheckoutOutcome {
            order: order_model,
            items,
            address: shipping_address,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: OrderModel,
    pub items: Vec<order_item::Model>,
    pub address: address::Model,
}
