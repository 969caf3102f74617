use crate::{
    auth::AuthUser,
    entities::{
        order, order_item, product, Address, AddressModel, Order, OrderItem, OrderModel,
        OrderStatus, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order reads and status transitions. Orders are created by
/// `CheckoutService`; after that the status is the only field that moves,
/// and only along the edges `OrderStatus::can_transition_to` allows.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches an order with its lines and shipping address. Customers
    /// may only read their own orders; admins may read any.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id))]
    pub async fn get_order(
        &self,
        requester: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !requester.can_act_for(order.user_id) {
            return Err(ServiceError::Forbidden(
                "order belongs to another user".to_string(),
            ));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        // Product titles for display; a deleted product leaves the line
        // intact with no title rather than failing the read.
        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let titles: HashMap<Uuid, String> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p.title))
                .collect()
        };

        let address = Address::find_by_id(order.address_id).one(&*self.db).await?;

        let lines = items
            .into_iter()
            .map(|item| OrderLineView {
                product_title: titles.get(&item.product_id).cloned(),
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            })
            .collect();

        Ok(OrderDetail {
            order_number: order_number(order.id),
            order,
            items: lines,
            address,
        })
    }

    /// Lists the requester's orders, newest first.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id))]
    pub async fn list_orders(&self, requester: &AuthUser) -> Result<Vec<OrderModel>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(requester.id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    /// Moves an order along the status state machine, rejecting edges the
    /// machine does not allow.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if old_status == new_status {
            return Ok(order);
        }
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "{} -> {} is not a valid order transition",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        info!(%order_id, %old_status, %new_status, "order status updated");
        Ok(updated)
    }
}

/// Display form of an order id, e.g. `1A2B3C4D-5E6F7A8B`.
pub fn order_number(id: Uuid) -> String {
    let hex = id.simple().to_string().to_uppercase();
    format!("{}-{}", &hex[..8], &hex[8..16])
}

#[derive(Debug, Serialize)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_title: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: OrderModel,
    pub order_number: String,
    pub items: Vec<OrderLineView>,
    pub address: Option<AddressModel>,
}
