use crate::{
    config::AppConfig,
    entities::{cart_item, CartItem, CartItemModel, Product, ProductStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service.
///
/// Carts are keyed directly on the user: one row per (user, product),
/// maintained through an atomic upsert so double-clicks and concurrent
/// tabs cannot create duplicate lines. Pricing is a pure read; totals are
/// never stored.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    tax_rate: Decimal,
    shipping_flat_rate: Decimal,
}

impl CartService {
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

    /// Sets the quantity for a (user, product) cart line.
    ///
    /// Replace semantics: calling twice with quantity `n` leaves exactly
    /// one line with quantity `n`. Quantity 0 removes the line. The write
    /// is a single upsert on the (user_id, product_id) unique key.
    #[instrument(skip(self))]
    pub async fn set_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }
        if quantity == 0 {
            self.remove_item(user_id, product_id).await?;
            return Ok(None);
        }

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.status != ProductStatus::Active {
            return Err(ServiceError::ValidationError(
                "product is not available for purchase".to_string(),
            ));
        }
        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "only {} of '{}' in stock",
                product.stock, product.title
            )));
        }

        let now = Utc::now();
        let line = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
        };

        CartItem::insert(line)
            .on_conflict(
                OnConflict::columns([cart_item::Column::UserId, cart_item::Column::ProductId])
                    .update_columns([cart_item::Column::Quantity, cart_item::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(&*self.db)
            .await?;

        let stored = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartItemSet {
                user_id,
                product_id,
                quantity,
            })
            .await;

        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id,
                product_id,
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let res = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        self.event_sender.send_or_log(Event::CartCleared(user_id)).await;
        info!(%user_id, removed = res.rows_affected, "cart cleared");
        Ok(res.rows_affected)
    }

    /// Prices the user's cart against current product data.
    ///
    /// Lines whose product no longer resolves are excluded from the
    /// totals and reported in `unavailable` instead of failing the read.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<PricedCart, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::new();
        let mut unavailable = Vec::new();
        for (item, maybe_product) in rows {
            match maybe_product {
                Some(p) => {
                    let line_total = p.price * Decimal::from(item.quantity);
                    lines.push(PricedLine {
                        product_id: p.id,
                        title: p.title,
                        unit_price: p.price,
                        quantity: item.quantity,
                        line_total,
                    });
                }
                None => unavailable.push(UnavailableLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                }),
            }
        }

        let priced: Vec<(i32, Decimal)> =
            lines.iter().map(|l| (l.quantity, l.unit_price)).collect();
        let totals = price_lines(&priced, self.tax_rate, self.shipping_flat_rate);

        Ok(PricedCart {
            lines,
            unavailable,
            totals,
        })
    }
}

/// Computes cart totals from (quantity, unit price) pairs.
/// subtotal = Σ qᵢ·pᵢ; tax = subtotal × rate; total = subtotal + tax + shipping.
pub fn price_lines(lines: &[(i32, Decimal)], tax_rate: Decimal, shipping: Decimal) -> CartTotals {
    let subtotal = lines
        .iter()
        .fold(Decimal::ZERO, |acc, (qty, price)| {
            acc + *price * Decimal::from(*qty)
        });
    let tax = subtotal * tax_rate;
    CartTotals {
        subtotal,
        tax,
        shipping,
        total: subtotal + tax + shipping,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A cart line whose product reference no longer resolves.
#[derive(Debug, Clone, Serialize)]
pub struct UnavailableLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub unavailable: Vec<UnavailableLine>,
    pub totals: CartTotals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fixed_scenario_matches_contract() {
        // One line: price 50000, qty 2 → subtotal 100000, tax 10000, total 110000
        let totals = price_lines(&[(2, dec!(50000))], dec!(0.10), Decimal::ZERO);
        assert_eq!(totals.subtotal, dec!(100000));
        assert_eq!(totals.tax, dec!(10000));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(110000));
    }

    #[test]
    fn empty_cart_prices_to_zero() {
        let totals = price_lines(&[], dec!(0.10), Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn flat_shipping_is_added_after_tax() {
        let totals = price_lines(&[(1, dec!(100))], dec!(0.10), dec!(5));
        assert_eq!(totals.total, dec!(115));
    }

    proptest! {
        #[test]
        fn subtotal_is_sum_of_lines(
            lines in proptest::collection::vec((1i32..100, 1i64..10_000_000), 0..20)
        ) {
            let priced: Vec<(i32, Decimal)> = lines
                .iter()
                .map(|(q, cents)| (*q, Decimal::new(*cents, 2)))
                .collect();
            let totals = price_lines(&priced, dec!(0.10), Decimal::ZERO);

            let expected = priced
                .iter()
                .fold(Decimal::ZERO, |acc, (q, p)| acc + *p * Decimal::from(*q));
            prop_assert_eq!(totals.subtotal, expected);
            prop_assert_eq!(totals.tax, expected * dec!(0.10));
            prop_assert_eq!(totals.total, expected + expected * dec!(0.10));
        }
    }
}
