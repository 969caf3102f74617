mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::entities::{user, OrderStatus, Role};
use uuid::Uuid;

async fn checkout(
    app: &TestApp,
    buyer: &user::Model,
    products: &[(Uuid, i32)],
) -> storefront_api::services::checkout::CheckoutOutcome {
    let auth = app.auth(buyer);
    let address = app.create_address(buyer).await;
    for (product_id, qty) in products {
        app.state
            .services
            .cart
            .set_item(buyer.id, *product_id, *qty)
            .await
            .expect("set item");
    }
    app.state
        .services
        .checkout
        .place_order(&auth, address.id)
        .await
        .expect("checkout")
}

#[tokio::test]
async fn fresh_vendor_gets_zeros_not_errors() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;

    let stats = app
        .state
        .services
        .vendor
        .vendor_stats(vendor.id)
        .await
        .expect("stats");
    assert_eq!(stats.product_count, 0);
    assert_eq!(stats.order_count, 0);
    assert_eq!(stats.revenue, Decimal::ZERO);
    assert!(stats.rating.is_none());

    let orders = app
        .state
        .services
        .vendor
        .vendor_orders(vendor.id)
        .await
        .expect("orders");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn stats_aggregate_orders_and_revenue() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let rival = app.create_user("rival", Role::Vendor).await;
    let first = app.create_user("first", Role::Customer).await;
    let second = app.create_user("second", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;

    let mouse = app
        .create_product(&vendor, &cat, "Mouse", dec!(30000), 20)
        .await;
    let keyboard = app
        .create_product(&vendor, &cat, "Keyboard", dec!(50000), 20)
        .await;
    // A rival's product must never leak into this vendor's numbers.
    let rival_product = app
        .create_product(&rival, &cat, "Rival Gadget", dec!(999000), 20)
        .await;

    // first buys 2 mice + 1 keyboard; second buys 1 keyboard + the rival's gadget.
    checkout(&app, &first, &[(mouse.id, 2), (keyboard.id, 1)]).await;
    checkout(&app, &second, &[(keyboard.id, 1), (rival_product.id, 1)]).await;

    let stats = app
        .state
        .services
        .vendor
        .vendor_stats(vendor.id)
        .await
        .expect("stats");
    assert_eq!(stats.product_count, 2);
    assert_eq!(stats.order_count, 2, "two distinct orders touch this vendor");
    // 2×30000 + 1×50000 + 1×50000 — snapshot prices, rival's line excluded
    assert_eq!(stats.revenue, dec!(160000));
}

#[tokio::test]
async fn cancelled_orders_are_excluded() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Cancelled item", dec!(40000), 20)
        .await;

    let outcome = checkout(&app, &buyer, &[(product.id, 1)]).await;
    app.state
        .services
        .orders
        .update_status(outcome.order.id, OrderStatus::Cancelled)
        .await
        .expect("cancel");

    let stats = app
        .state
        .services
        .vendor
        .vendor_stats(vendor.id)
        .await
        .expect("stats");
    assert_eq!(stats.order_count, 0);
    assert_eq!(stats.revenue, Decimal::ZERO);
}

#[tokio::test]
async fn vendor_orders_only_contain_their_lines() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let rival = app.create_user("rival", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;

    let own = app
        .create_product(&vendor, &cat, "Own", dec!(10000), 20)
        .await;
    let foreign = app
        .create_product(&rival, &cat, "Foreign", dec!(20000), 20)
        .await;

    let outcome = checkout(&app, &buyer, &[(own.id, 1), (foreign.id, 1)]).await;

    let views = app
        .state
        .services
        .vendor
        .vendor_orders(vendor.id)
        .await
        .expect("orders");
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].order_id, outcome.order.id);
    assert_eq!(views[0].lines.len(), 1, "only this vendor's line");
    assert_eq!(views[0].lines[0].product_id, own.id);
}

#[tokio::test]
async fn vendor_rating_averages_across_their_products() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let first = app.create_user("first", Role::Customer).await;
    let second = app.create_user("second", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;

    let a = app.create_product(&vendor, &cat, "A", dec!(10000), 20).await;
    let b = app.create_product(&vendor, &cat, "B", dec!(20000), 20).await;

    for (buyer, product, rating, comment) in [
        (&first, &a, 5, "Exactly as described"),
        (&second, &b, 2, "Arrived late and scratched"),
    ] {
        let outcome = checkout(&app, buyer, &[(product.id, 1)]).await;
        app.state
            .services
            .orders
            .update_status(outcome.order.id, OrderStatus::Paid)
            .await
            .expect("mark paid");
        app.state
            .services
            .reviews
            .submit(&app.auth(buyer), product.id, rating, comment)
            .await
            .expect("review");
    }

    let stats = app
        .state
        .services
        .vendor
        .vendor_stats(vendor.id)
        .await
        .expect("stats");
    let rating = stats.rating.expect("has rating");
    assert_eq!(rating.average, dec!(3.5));
    assert_eq!(rating.count, 2);
}

#[tokio::test]
async fn admin_stats_cover_the_whole_marketplace() {
    let app = TestApp::new().await;
    let vendor = app.create_user("vendor", Role::Vendor).await;
    let buyer = app.create_user("buyer", Role::Customer).await;
    let cat = app.create_category("Electronics", "electronics").await;
    let product = app
        .create_product(&vendor, &cat, "Only product", dec!(50000), 20)
        .await;

    let outcome = checkout(&app, &buyer, &[(product.id, 2)]).await;

    let stats = app
        .state
        .services
        .vendor
        .admin_stats()
        .await
        .expect("stats");
    assert_eq!(stats.user_count, 2);
    assert_eq!(stats.product_count, 1);
    assert_eq!(stats.order_count, 1);
    // Order totals include tax: 100000 × 1.10
    assert_eq!(stats.revenue, outcome.order.total);
    assert_eq!(stats.revenue, dec!(110000));
}
