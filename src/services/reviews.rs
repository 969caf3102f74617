use crate::{
    auth::AuthUser,
    config::{AppConfig, ReviewEligibility},
    entities::{
        order, order_item, review, user, Order, OrderItem, OrderStatus, Product, Review,
        ReviewModel, User,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

fn paid_or_later() -> [OrderStatus; 5] {
    [
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::InReturn,
    ]
}

/// Review submission and rating aggregation.
///
/// One review per (product, user), enforced by a unique index so the
/// second of two concurrent submissions conflicts instead of storing a
/// duplicate. The aggregate rating is recomputed from the review set on
/// read; there is no cached mean to drift out of sync.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    min_comment_chars: usize,
    eligibility: ReviewEligibility,
}

impl ReviewService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            min_comment_chars: config.review_min_comment_chars,
            eligibility: config.review_eligibility,
        }
    }

    /// Submits a review. All preconditions are checked before any write:
    /// rating in [1,5], comment long enough, product exists, purchase
    /// eligibility under the configured policy, no prior review.
    #[instrument(skip(self, requester, comment), fields(requester_id = %requester.id))]
    pub async fn submit(
        &self,
        requester: &AuthUser,
        product_id: Uuid,
        rating: i16,
        comment: &str,
    ) -> Result<ReviewModel, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::ValidationError(
                "rating must be an integer between 1 and 5".to_string(),
            ));
        }
        let comment = comment.trim();
        if comment.chars().count() < self.min_comment_chars {
            return Err(ServiceError::ValidationError(format!(
                "comment must be at least {} characters",
                self.min_comment_chars
            )));
        }

        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !self.is_eligible(requester.id, product_id).await? {
            return Err(ServiceError::Forbidden(match self.eligibility {
                ReviewEligibility::PurchasedProduct => {
                    "you can only review products you have bought and paid for".to_string()
                }
                ReviewEligibility::AnyPaidOrder => {
                    "you need a paid order before writing reviews".to_string()
                }
            }));
        }

        let already = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(requester.id))
            .count(&*self.db)
            .await?;
        if already > 0 {
            return Err(ServiceError::Conflict(
                "you have already reviewed this product".to_string(),
            ));
        }

        let stored = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(requester.id),
            rating: Set(rating),
            comment: Set(comment.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            // The unique index catches the race the count above cannot.
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::Conflict("you have already reviewed this product".to_string())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                product_id,
                user_id: requester.id,
                rating,
            })
            .await;

        info!(%product_id, rating, "review submitted");
        Ok(stored)
    }

    async fn is_eligible(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError> {
        let count = match self.eligibility {
            ReviewEligibility::PurchasedProduct => {
                OrderItem::find()
                    .filter(order_item::Column::ProductId.eq(product_id))
                    .join(JoinType::InnerJoin, order_item::Relation::Order.def())
                    .filter(order::Column::UserId.eq(user_id))
                    .filter(order::Column::Status.is_in(paid_or_later()))
                    .count(&*self.db)
                    .await?
            }
            ReviewEligibility::AnyPaidOrder => {
                Order::find()
                    .filter(order::Column::UserId.eq(user_id))
                    .filter(order::Column::Status.is_in(paid_or_later()))
                    .count(&*self.db)
                    .await?
            }
        };
        Ok(count > 0)
    }

    /// The product's aggregate rating: mean of all review ratings rounded
    /// to one decimal place, or `None` when there are no reviews. Never 0
    /// for an unreviewed product.
    #[instrument(skip(self))]
    pub async fn rating_summary(
        &self,
        product_id: Uuid,
    ) -> Result<Option<RatingSummary>, ServiceError> {
        let ratings: Vec<i16> = Review::find()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::ProductId.eq(product_id))
            .into_tuple()
            .all(&*self.db)
            .await?;

        Ok(summarize_ratings(&ratings))
    }

    /// Lists a product's reviews, newest first, with reviewer display
    /// names attached.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ReviewView>, ServiceError> {
        let reviews = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let reviewer_ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
        let names: HashMap<Uuid, String> = if reviewer_ids.is_empty() {
            HashMap::new()
        } else {
            User::find()
                .filter(user::Column::Id.is_in(reviewer_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect()
        };

        Ok(reviews
            .into_iter()
            .map(|r| ReviewView {
                reviewer_name: names.get(&r.user_id).cloned(),
                review: r,
            })
            .collect())
    }
}

/// Mean rating rounded to one decimal place; `None` for an empty set.
pub fn summarize_ratings(ratings: &[i16]) -> Option<RatingSummary> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    let average = (Decimal::from(sum) / Decimal::from(ratings.len() as i64)).round_dp(1);
    Some(RatingSummary {
        average,
        count: ratings.len() as u64,
    })
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RatingSummary {
    pub average: Decimal,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub reviewer_name: Option<String>,
    pub review: ReviewModel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_reviews_is_none_not_zero() {
        assert_eq!(summarize_ratings(&[]), None);
    }

    #[test]
    fn mean_is_rounded_to_one_decimal() {
        let summary = summarize_ratings(&[4, 5]).expect("summary");
        assert_eq!(summary.average, dec!(4.5));
        assert_eq!(summary.count, 2);

        let summary = summarize_ratings(&[5, 4, 4]).expect("summary");
        assert_eq!(summary.average, dec!(4.3));

        let summary = summarize_ratings(&[1, 1, 2]).expect("summary");
        assert_eq!(summary.average, dec!(1.3));
    }

    #[test]
    fn single_review_mean_is_exact() {
        let summary = summarize_ratings(&[3]).expect("summary");
        assert_eq!(summary.average, dec!(3.0));
        assert_eq!(summary.count, 1);
    }
}
