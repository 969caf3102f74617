use crate::{
    auth::AuthUser,
    config::AppConfig,
    entities::{
        order, order_item, product, return_request, Order, OrderItem, OrderModel, OrderStatus,
        Product, ProductStatus, ReturnReason, ReturnRequest, ReturnRequestModel, ReturnStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Return-request processing.
///
/// An order is returnable while `now <= created_at + window`, where the
/// window is the single configured constant applied uniformly to both
/// eligibility checks and the displayed deadline. Submitting a request
/// restores the product's stock by the ordered quantity in the same
/// transaction; the (order, product) unique key turns a concurrent
/// duplicate into a conflict instead of a double increment.
#[derive(Clone)]
pub struct ReturnService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    window: Duration,
}

impl ReturnService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            window: Duration::days(config.return_window_days),
        }
    }

    /// The instant the return window closes for an order.
    pub fn return_deadline(&self, order: &OrderModel) -> DateTime<Utc> {
        return_deadline(order, self.window)
    }

    /// Whether a return may still be requested for this order.
    pub fn is_returnable(&self, order: &OrderModel, now: DateTime<Utc>) -> bool {
        is_returnable(order, self.window, now)
    }

    /// Submits a return request for one product line of an order.
    #[instrument(skip(self, requester, input), fields(requester_id = %requester.id))]
    pub async fn submit(
        &self,
        requester: &AuthUser,
        order_id: Uuid,
        input: SubmitReturnInput,
    ) -> Result<ReturnRequestModel, ServiceError> {
        if input.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a return reason is required".to_string(),
            ));
        }

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !requester.can_act_for(order.user_id) {
            return Err(ServiceError::Forbidden(
                "order belongs to another user".to_string(),
            ));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::ValidationError(
                "cancelled orders cannot be returned".to_string(),
            ));
        }
        let now = Utc::now();
        if !self.is_returnable(&order, now) {
            return Err(ServiceError::ValidationError(format!(
                "the return window closed on {}",
                self.return_deadline(&order).format("%Y-%m-%d")
            )));
        }

        let txn = self.db.begin().await?;

        let line = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Order {} has no line for product {}",
                    order_id, input.product_id
                ))
            })?;

        let request = return_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(input.product_id),
            reason_code: Set(input.reason_code),
            reason: Set(input.reason),
            comments: Set(input.comments),
            status: Set(ReturnStatus::Pending),
            requested_at: Set(now),
        };
        let request = request.insert(&txn).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::Conflict(
                    "a return request for this order line already exists".to_string(),
                )
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        // Atomic restock by the ordered quantity; a replenished sold-out
        // product rejoins the catalog.
        Product::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col((product::Entity, product::Column::Stock)).add(line.quantity),
            )
            .filter(product::Column::Id.eq(input.product_id))
            .exec(&txn)
            .await?;
        Product::update_many()
            .set(product::ActiveModel {
                status: Set(ProductStatus::Active),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(product::Column::Id.eq(input.product_id))
            .filter(product::Column::Status.eq(ProductStatus::SoldOut))
            .filter(product::Column::Stock.gt(0))
            .exec(&txn)
            .await?;

        // A single-product order goes into the return flow as a whole.
        let distinct_products = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .count(&txn)
            .await?;
        if distinct_products == 1 && order.status.can_transition_to(OrderStatus::InReturn) {
            let mut active: order::ActiveModel = order.clone().into();
            active.status = Set(OrderStatus::InReturn);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReturnRequested {
                return_id: request.id,
                order_id,
                product_id: request.product_id,
            })
            .await;

        info!(return_id = %request.id, %order_id, "return request submitted");
        Ok(request)
    }

    /// Approves a pending request. Stock was already adjusted at
    /// submission; this only moves the request status.
    #[instrument(skip(self))]
    pub async fn approve(&self, return_id: Uuid) -> Result<ReturnRequestModel, ServiceError> {
        let updated = self
            .set_status(return_id, ReturnStatus::Approved)
            .await?;
        self.event_sender
            .send_or_log(Event::ReturnApproved(return_id))
            .await;
        Ok(updated)
    }

    /// Rejects a pending request.
    #[instrument(skip(self))]
    pub async fn reject(&self, return_id: Uuid) -> Result<ReturnRequestModel, ServiceError> {
        let updated = self
            .set_status(return_id, ReturnStatus::Rejected)
            .await?;
        self.event_sender
            .send_or_log(Event::ReturnRejected(return_id))
            .await;
        Ok(updated)
    }

    async fn set_status(
        &self,
        return_id: Uuid,
        status: ReturnStatus,
    ) -> Result<ReturnRequestModel, ServiceError> {
        let request = ReturnRequest::find_by_id(return_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Return request {} not found", return_id))
            })?;

        if request.status != ReturnStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "return request is already {:?}",
                request.status
            )));
        }

        let mut active: return_request::ActiveModel = request.into();
        active.status = Set(status);
        Ok(active.update(&*self.db).await?)
    }

    /// Lists the return requests attached to an order.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id))]
    pub async fn list_for_order(
        &self,
        requester: &AuthUser,
        order_id: Uuid,
    ) -> Result<Vec<ReturnRequestModel>, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if !requester.can_act_for(order.user_id) {
            return Err(ServiceError::Forbidden(
                "order belongs to another user".to_string(),
            ));
        }

        let requests = ReturnRequest::find()
            .filter(return_request::Column::OrderId.eq(order_id))
            .order_by_desc(return_request::Column::RequestedAt)
            .all(&*self.db)
            .await?;
        Ok(requests)
    }
}

fn return_deadline(order: &OrderModel, window: Duration) -> DateTime<Utc> {
    order.created_at + window
}

fn is_returnable(order: &OrderModel, window: Duration, now: DateTime<Utc>) -> bool {
    order.status != OrderStatus::Cancelled && now <= return_deadline(order, window)
}

#[derive(Debug, Clone)]
pub struct SubmitReturnInput {
    pub product_id: Uuid,
    pub reason_code: ReturnReason,
    pub reason: String,
    pub comments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_created_at(created_at: DateTime<Utc>) -> OrderModel {
        OrderModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            total: rust_decimal::Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn thirty_day_window_boundaries() {
        let window = Duration::days(30);
        let placed = Utc::now();
        let order = order_created_at(placed);

        assert!(is_returnable(&order, window, placed + Duration::days(29)));
        assert!(is_returnable(&order, window, placed + Duration::days(30)));
        assert!(!is_returnable(&order, window, placed + Duration::days(31)));
    }

    #[test]
    fn deadline_is_created_at_plus_window() {
        let placed = Utc::now();
        let order = order_created_at(placed);
        assert_eq!(
            return_deadline(&order, Duration::days(30)),
            placed + Duration::days(30)
        );
    }

    #[test]
    fn cancelled_orders_are_never_returnable() {
        let window = Duration::days(30);
        let mut order = order_created_at(Utc::now());
        order.status = OrderStatus::Cancelled;
        assert!(!is_returnable(&order, window, Utc::now()));
    }
}
