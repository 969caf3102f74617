use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    auth::{self, AuthUser},
    config::AppConfig,
    db,
    entities::{address, category, product, store, user, ProductStatus, Role},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Test harness backed by an in-memory SQLite database with the full
/// migration set applied.
pub struct TestApp {
    pub state: AppState,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app with config tweaks applied before service
    /// construction (e.g. a different review-eligibility policy).
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "test".to_string(),
        );
        // A single pooled connection keeps the in-memory database alive
        // and shared for the whole test.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg);

        Self {
            state: AppState {
                db: db_arc,
                config: cfg,
                event_sender,
                services,
            },
        }
    }

    pub async fn create_user(&self, name: &str, role: Role) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(format!("{}-{}@example.com", name, Uuid::new_v4())),
            name: Set(name.to_string()),
            role: Set(role),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to create test user")
    }

    /// The full HTTP router, wired the way `main` wires it.
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::authenticate,
            ))
            .with_state(self.state.clone())
    }

    /// A bearer token as the external identity provider would mint it.
    pub fn token_for(&self, u: &user::Model) -> String {
        auth::mint_token(
            u.id,
            &u.email,
            u.role,
            &self.state.config.jwt_secret,
            Duration::from_secs(3600),
        )
        .expect("failed to mint test token")
    }

    /// The principal a request by this user would carry.
    pub fn auth(&self, u: &user::Model) -> AuthUser {
        AuthUser {
            id: u.id,
            email: u.email.clone(),
            role: u.role,
        }
    }

    pub async fn create_store(&self, vendor: &user::Model, name: &str) -> store::Model {
        store::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(vendor.id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to create test store")
    }

    pub async fn create_category(&self, name: &str, slug: &str) -> category::Model {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to create test category")
    }

    pub async fn create_product(
        &self,
        vendor: &user::Model,
        category: &category::Model,
        title: &str,
        price: Decimal,
        stock: i32,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(format!("{} description", title)),
            price: Set(price),
            stock: Set(stock),
            status: Set(if stock > 0 {
                ProductStatus::Active
            } else {
                ProductStatus::SoldOut
            }),
            vendor_id: Set(vendor.id),
            category_id: Set(category.id),
            image_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to create test product")
    }

    pub async fn create_address(&self, owner: &user::Model) -> address::Model {
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner.id),
            recipient: Set(owner.name.clone()),
            street: Set("Calle 72 #10-34".to_string()),
            city: Set("Barranquilla".to_string()),
            region: Set("Atlántico".to_string()),
            postal_code: Set("080001".to_string()),
            country: Set("CO".to_string()),
            phone: Set(Some("+57 300 000 0000".to_string())),
            delivery_instructions: Set(None),
            is_default: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to create test address")
    }
}
