mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use storefront_api::{
    entities::{order_item, Product, ProductStatus, Role},
    errors::ServiceError,
    services::catalog::{
        CatalogFilter, CreateProductInput, PriceBand, ProductRemoval, SortKey, UpdateProductInput,
    },
};
use uuid::Uuid;

async fn seeded_app() -> (TestApp, storefront_api::entities::user::Model) {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    app.create_store(&vendor, "Casa Electrónica").await;
    let electronics = app.create_category("Electronics", "electronics").await;
    let books = app.create_category("Books", "books").await;

    app.create_product(&vendor, &electronics, "Budget Mouse", dec!(30000), 10)
        .await;
    app.create_product(&vendor, &electronics, "Gaming Laptop", dec!(100000), 5)
        .await;
    app.create_product(&vendor, &electronics, "Workstation", dec!(200000), 3)
        .await;
    app.create_product(&vendor, &books, "Rust Book", dec!(80000), 7)
        .await;

    // Hidden inventory: one inactive, one drained.
    let hidden = app
        .create_product(&vendor, &electronics, "Retired Gadget", dec!(50000), 4)
        .await;
    let mut active: storefront_api::entities::product::ActiveModel = hidden.into();
    active.status = Set(ProductStatus::Inactive);
    active.update(&*app.state.db).await.expect("hide");
    app.create_product(&vendor, &electronics, "Sold Out Cam", dec!(70000), 0)
        .await;

    (app, vendor)
}

fn filter() -> CatalogFilter {
    CatalogFilter {
        page: 1,
        per_page: 20,
        ..Default::default()
    }
}

#[tokio::test]
async fn default_search_lists_only_active_products() {
    let (app, _) = seeded_app().await;

    let (hits, total) = app
        .state
        .services
        .catalog
        .search(&filter())
        .await
        .expect("search");
    assert_eq!(total, 4);
    assert!(hits
        .iter()
        .all(|p| p.product.status == ProductStatus::Active));
}

#[tokio::test]
async fn include_hidden_shows_everything_to_vendors() {
    let (app, _) = seeded_app().await;

    let mut f = filter();
    f.include_hidden = true;
    let (_, total) = app
        .state
        .services
        .catalog
        .search(&f)
        .await
        .expect("search");
    assert_eq!(total, 6);
}

#[tokio::test]
async fn price_bands_match_their_bounds() {
    let (app, _) = seeded_app().await;
    let catalog = &app.state.services.catalog;

    let mut f = filter();
    f.band = Some(PriceBand::Under50k);
    let (hits, _) = catalog.search(&f).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].product.title, "Budget Mouse");

    f.band = Some(PriceBand::Mid50kTo150k);
    let (hits, _) = catalog.search(&f).await.expect("search");
    let titles: Vec<_> = hits.iter().map(|p| p.product.title.as_str()).collect();
    assert!(titles.contains(&"Gaming Laptop"));
    assert!(titles.contains(&"Rust Book"));
    assert_eq!(hits.len(), 2);

    f.band = Some(PriceBand::Over150k);
    let (hits, _) = catalog.search(&f).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].product.title, "Workstation");
}

#[tokio::test]
async fn text_search_is_case_insensitive() {
    let (app, _) = seeded_app().await;

    let mut f = filter();
    f.query = Some("LAPTOP".to_string());
    let (hits, _) = app
        .state
        .services
        .catalog
        .search(&f)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].product.title, "Gaming Laptop");

    // Substring match against the description too.
    f.query = Some("rust book desc".to_string().to_uppercase());
    let (hits, _) = app
        .state
        .services
        .catalog
        .search(&f)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn sort_by_price_works_both_ways() {
    let (app, _) = seeded_app().await;
    let catalog = &app.state.services.catalog;

    let mut f = filter();
    f.sort = SortKey::PriceAsc;
    let (hits, _) = catalog.search(&f).await.expect("search");
    let prices: Vec<_> = hits.iter().map(|p| p.product.price).collect();
    let mut sorted = prices.clone();
    sorted.sort();
    assert_eq!(prices, sorted);

    f.sort = SortKey::PriceDesc;
    let (hits, _) = catalog.search(&f).await.expect("search");
    let prices: Vec<_> = hits.iter().map(|p| p.product.price).collect();
    let mut sorted = prices.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(prices, sorted);
}

#[tokio::test]
async fn category_filter_uses_the_slug() {
    let (app, _) = seeded_app().await;

    let mut f = filter();
    f.category_slug = Some("books".to_string());
    let (hits, _) = app
        .state
        .services
        .catalog
        .search(&f)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].product.title, "Rust Book");

    f.category_slug = Some("does-not-exist".to_string());
    let err = app
        .state
        .services
        .catalog
        .search(&f)
        .await
        .expect_err("unknown category");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn hits_carry_store_name_as_seller() {
    let (app, _) = seeded_app().await;

    let (hits, _) = app
        .state
        .services
        .catalog
        .search(&filter())
        .await
        .expect("search");
    assert!(hits
        .iter()
        .all(|p| p.seller_name.as_deref() == Some("Casa Electrónica")));
    assert!(hits.iter().all(|p| p.rating.is_none()));
}

#[tokio::test]
async fn vendors_cannot_touch_each_others_products() {
    let (app, _) = seeded_app().await;
    let intruder = app.create_user("intruder", Role::Vendor).await;

    let (hits, _) = app
        .state
        .services
        .catalog
        .search(&filter())
        .await
        .expect("search");
    let victim = hits[0].product.id;

    let err = app
        .state
        .services
        .catalog
        .update_product(
            &app.auth(&intruder),
            victim,
            UpdateProductInput {
                price: Some(dec!(1)),
                ..Default::default()
            },
        )
        .await
        .expect_err("foreign update must fail");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = app
        .state
        .services
        .catalog
        .delete_product(&app.auth(&intruder), victim)
        .await
        .expect_err("foreign delete must fail");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn create_product_validates_and_stores() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let cat = app.create_category("Electronics", "electronics").await;

    let catalog = &app.state.services.catalog;
    let err = catalog
        .create_product(
            &app.auth(&vendor),
            CreateProductInput {
                title: "Freebie".to_string(),
                description: String::new(),
                price: dec!(0),
                stock: 1,
                category_id: cat.id,
                image_url: None,
            },
        )
        .await
        .expect_err("zero price must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let stored = catalog
        .create_product(
            &app.auth(&vendor),
            CreateProductInput {
                title: "  Keyboard  ".to_string(),
                description: "Mechanical, tenkeyless".to_string(),
                price: dec!(150000),
                stock: 4,
                category_id: cat.id,
                image_url: None,
            },
        )
        .await
        .expect("create");
    assert_eq!(stored.title, "Keyboard");
    assert_eq!(stored.status, ProductStatus::Active);
    assert_eq!(stored.vendor_id, vendor.id);
}

#[tokio::test]
async fn delete_hides_products_with_order_history() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let fresh = app
        .create_product(&vendor, &cat, "Fresh", dec!(10000), 5)
        .await;
    let sold = app
        .create_product(&vendor, &cat, "Sold before", dec!(20000), 5)
        .await;

    // Order history referencing the sold product.
    order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(Uuid::new_v4()),
        product_id: Set(sold.id),
        quantity: Set(1),
        unit_price: Set(dec!(20000)),
        line_total: Set(dec!(20000)),
    }
    .insert(&*app.state.db)
    .await
    .expect("seed order item");

    let catalog = &app.state.services.catalog;
    let auth = app.auth(&vendor);

    let removal = catalog.delete_product(&auth, fresh.id).await.expect("delete");
    assert_eq!(removal, ProductRemoval::Removed);
    assert!(Product::find_by_id(fresh.id)
        .one(&*app.state.db)
        .await
        .expect("q")
        .is_none());

    let removal = catalog.delete_product(&auth, sold.id).await.expect("delete");
    assert_eq!(removal, ProductRemoval::Hidden);
    let hidden = Product::find_by_id(sold.id)
        .one(&*app.state.db)
        .await
        .expect("q")
        .expect("row kept");
    assert_eq!(hidden.status, ProductStatus::Inactive);

    // Hidden products 404 for ordinary callers but resolve for the owner.
    let err = catalog
        .get_product(sold.id, None)
        .await
        .expect_err("hidden for anonymous");
    assert!(matches!(err, ServiceError::NotFound(_)));
    catalog
        .get_product(sold.id, Some(&auth))
        .await
        .expect("visible to the owner");
}
