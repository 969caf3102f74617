mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::{
    entities::{CartItem, Product, Role},
    errors::ServiceError,
};

#[tokio::test]
async fn set_item_replaces_quantity() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Headphones", dec!(80000), 10)
        .await;

    let cart = &app.state.services.cart;
    cart.set_item(buyer.id, product.id, 2).await.expect("first set");
    cart.set_item(buyer.id, product.id, 3).await.expect("second set");

    let lines = CartItem::find().all(&*app.state.db).await.expect("query");
    assert_eq!(lines.len(), 1, "upsert must not create a duplicate line");
    assert_eq!(lines[0].quantity, 3, "second call replaces the quantity");
}

#[tokio::test]
async fn totals_follow_the_ten_percent_contract() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Monitor", dec!(50000), 5)
        .await;

    let cart = &app.state.services.cart;
    cart.set_item(buyer.id, product.id, 2).await.expect("set");

    let priced = cart.get_cart(buyer.id).await.expect("price");
    assert_eq!(priced.totals.subtotal, dec!(100000));
    assert_eq!(priced.totals.tax, dec!(10000));
    assert_eq!(priced.totals.shipping, Decimal::ZERO);
    assert_eq!(priced.totals.total, dec!(110000));
}

#[tokio::test]
async fn dangling_product_is_flagged_not_fatal() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let keeper = app
        .create_product(&vendor, &cat, "Keyboard", dec!(30000), 5)
        .await;
    let doomed = app
        .create_product(&vendor, &cat, "Mouse", dec!(20000), 5)
        .await;

    let cart = &app.state.services.cart;
    cart.set_item(buyer.id, keeper.id, 1).await.expect("set keeper");
    cart.set_item(buyer.id, doomed.id, 2).await.expect("set doomed");

    // The product disappears out from under the cart line.
    Product::delete_by_id(doomed.id)
        .exec(&*app.state.db)
        .await
        .expect("delete");

    let priced = cart.get_cart(buyer.id).await.expect("pricing must not fail");
    assert_eq!(priced.lines.len(), 1);
    assert_eq!(priced.unavailable.len(), 1);
    assert_eq!(priced.unavailable[0].product_id, doomed.id);
    // Only the resolvable line is priced.
    assert_eq!(priced.totals.subtotal, dec!(30000));
}

#[tokio::test]
async fn quantity_zero_removes_the_line() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Webcam", dec!(45000), 5)
        .await;

    let cart = &app.state.services.cart;
    cart.set_item(buyer.id, product.id, 2).await.expect("set");
    let stored = cart.set_item(buyer.id, product.id, 0).await.expect("unset");
    assert!(stored.is_none());

    let priced = cart.get_cart(buyer.id).await.expect("price");
    assert!(priced.lines.is_empty());
}

#[tokio::test]
async fn cannot_add_more_than_stock() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Limited", dec!(99000), 2)
        .await;

    let err = app
        .state
        .services
        .cart
        .set_item(buyer.id, product.id, 3)
        .await
        .expect_err("over-stock add must fail");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
}

#[tokio::test]
async fn negative_quantity_is_rejected() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Speaker", dec!(60000), 5)
        .await;

    let err = app
        .state
        .services
        .cart
        .set_item(buyer.id, product.id, -1)
        .await
        .expect_err("negative quantity must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn clear_empties_the_cart() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let a = app.create_product(&vendor, &cat, "A", dec!(10000), 5).await;
    let b = app.create_product(&vendor, &cat, "B", dec!(20000), 5).await;

    let cart = &app.state.services.cart;
    cart.set_item(buyer.id, a.id, 1).await.expect("set a");
    cart.set_item(buyer.id, b.id, 1).await.expect("set b");

    let removed = cart.clear(buyer.id).await.expect("clear");
    assert_eq!(removed, 2);
    let priced = cart.get_cart(buyer.id).await.expect("price");
    assert!(priced.lines.is_empty());
    assert_eq!(priced.totals.total, Decimal::ZERO);
}
