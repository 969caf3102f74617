pub mod addresses;
pub mod carts;
pub mod categories;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;
pub mod returns;
pub mod vendor;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        addresses::AddressService, cart::CartService, catalog::CatalogService,
        checkout::CheckoutService, orders::OrderService, returns::ReturnService,
        reviews::ReviewService, vendor::VendorService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Aggregate of the domain services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub addresses: Arc<AddressService>,
    pub cart: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub returns: Arc<ReturnService>,
    pub reviews: Arc<ReviewService>,
    pub vendor: Arc<VendorService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            addresses: Arc::new(AddressService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone(), config)),
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(db.clone(), event_sender.clone(), config)),
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            returns: Arc::new(ReturnService::new(db.clone(), event_sender.clone(), config)),
            reviews: Arc::new(ReviewService::new(db.clone(), event_sender.clone(), config)),
            vendor: Arc::new(VendorService::new(db)),
        }
    }
}
