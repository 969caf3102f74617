use crate::{
    auth::AuthUser,
    entities::{address, order, Address, AddressModel, Order},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateAddressInput {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub delivery_instructions: Option<String>,
    pub is_default: bool,
}

/// User shipping addresses. The first address a user creates becomes the
/// default automatically; claiming the default later demotes the others
/// in the same transaction so exactly one default survives.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, requester), fields(user_id = %requester.id))]
    pub async fn list(&self, requester: &AuthUser) -> Result<Vec<AddressModel>, ServiceError> {
        let addresses = Address::find()
            .filter(address::Column::UserId.eq(requester.id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(addresses)
    }

    #[instrument(skip(self, requester, input), fields(user_id = %requester.id))]
    pub async fn create(
        &self,
        requester: &AuthUser,
        input: CreateAddressInput,
    ) -> Result<AddressModel, ServiceError> {
        for (field, value) in [
            ("recipient", &input.recipient),
            ("street", &input.street),
            ("city", &input.city),
            ("postal_code", &input.postal_code),
            ("country", &input.country),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        let txn = self.db.begin().await?;

        let existing = Address::find()
            .filter(address::Column::UserId.eq(requester.id))
            .count(&txn)
            .await?;
        let make_default = input.is_default || existing == 0;

        if make_default && existing > 0 {
            Address::update_many()
                .set(address::ActiveModel {
                    is_default: Set(false),
                    ..Default::default()
                })
                .filter(address::Column::UserId.eq(requester.id))
                .exec(&txn)
                .await?;
        }

        let stored = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(requester.id),
            recipient: Set(input.recipient.trim().to_string()),
            street: Set(input.street.trim().to_string()),
            city: Set(input.city.trim().to_string()),
            region: Set(input.region.trim().to_string()),
            postal_code: Set(input.postal_code.trim().to_string()),
            country: Set(input.country.trim().to_string()),
            phone: Set(input.phone),
            delivery_instructions: Set(input.delivery_instructions),
            is_default: Set(make_default),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(stored)
    }

    /// Makes one address the default, demoting the user's others.
    #[instrument(skip(self, requester), fields(user_id = %requester.id))]
    pub async fn set_default(
        &self,
        requester: &AuthUser,
        address_id: Uuid,
    ) -> Result<AddressModel, ServiceError> {
        let txn = self.db.begin().await?;

        let target = Address::find_by_id(address_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        if target.user_id != requester.id {
            return Err(ServiceError::Forbidden(
                "address belongs to another user".to_string(),
            ));
        }

        Address::update_many()
            .set(address::ActiveModel {
                is_default: Set(false),
                ..Default::default()
            })
            .filter(address::Column::UserId.eq(requester.id))
            .exec(&txn)
            .await?;

        let mut active: address::ActiveModel = target.into();
        active.is_default = Set(true);
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Deletes an address unless an order still references it; order
    /// history keeps its shipping snapshot.
    #[instrument(skip(self, requester), fields(user_id = %requester.id))]
    pub async fn delete(
        &self,
        requester: &AuthUser,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let target = Address::find_by_id(address_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        if target.user_id != requester.id {
            return Err(ServiceError::Forbidden(
                "address belongs to another user".to_string(),
            ));
        }

        let referenced = Order::find()
            .filter(order::Column::AddressId.eq(address_id))
            .count(&*self.db)
            .await?;
        if referenced > 0 {
            return Err(ServiceError::Conflict(
                "address is referenced by an order and cannot be deleted".to_string(),
            ));
        }

        Address::delete_by_id(address_id).exec(&*self.db).await?;
        Ok(())
    }
}
