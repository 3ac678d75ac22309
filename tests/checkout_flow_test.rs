mod common;

use common::{customer, spawn_app};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, EntityTrait};
use supplyfront_api::entities::{Order, OrderItem, OrderStatus};
use supplyfront_api::errors::ServiceError;

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn checkout_persists_order_with_snapshot_prices() {
    let app = spawn_app().await;
    let user = customer();
    let cups = app.seed_product("Foam Cups 16oz", dec!(12.50), "Cups").await;
    let bowls = app.seed_product("Paper Bowls", dec!(25.00), "Bowls").await;

    let carts = &app.state.services.carts;
    carts
        .add_item("s1", cups.id, &cups.name, cups.price, 2) // 25.00
        .await
        .expect("add cups");
    carts
        .add_item("s1", bowls.id, &bowls.name, bowls.price, 3) // 75.00
        .await
        .expect("add bowls");

    let snapshot = carts.snapshot("s1");
    let receipt = app
        .state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .expect("checkout");

    assert_eq!(receipt.subtotal, dec!(100.00));
    assert_eq!(receipt.discount_amount, dec!(0.00));
    assert_eq!(receipt.tax_amount, dec!(5.00));
    assert_eq!(receipt.total, dec!(105.00));

    let order = Order::find_by_id(receipt.order_id)
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("order exists");
    assert_eq!(order.user_id, user.user_id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, dec!(105.00));

    let items = OrderItem::find().all(&*app.state.db).await.expect("query");
    assert_eq!(items.len(), 2);
    let cups_line = items
        .iter()
        .find(|i| i.product_id == cups.id)
        .expect("cups line");
    assert_eq!(cups_line.price_at_purchase, dec!(12.50));
    assert_eq!(cups_line.quantity, 2);
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn save10_reduces_total_but_not_tax() {
    let app = spawn_app().await;
    let user = customer();
    let trays = app.seed_product("Serving Trays", dec!(50.00), "Containers").await;

    let carts = &app.state.services.carts;
    carts
        .add_item("s2", trays.id, &trays.name, trays.price, 2) // 100.00
        .await
        .expect("add");
    carts.apply_discount("s2", "SAVE10").await.expect("apply");

    let snapshot = carts.snapshot("s2");
    let receipt = app
        .state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .expect("checkout");

    assert_eq!(receipt.discount_amount, dec!(10.00));
    // Tax is computed on the pre-discount subtotal.
    assert_eq!(receipt.tax_amount, dec!(5.00));
    assert_eq!(receipt.total, dec!(95.00));
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn empty_cart_cannot_check_out() {
    let app = spawn_app().await;
    let user = customer();

    let snapshot = app.state.services.carts.snapshot("empty-session");
    let err = app
        .state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .expect_err("empty cart must be rejected");

    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert!(Order::find().all(&*app.state.db).await.expect("query").is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn invalid_code_fails_checkout_without_an_order() {
    let app = spawn_app().await;
    let user = customer();
    let cups = app.seed_product("Foam Cups", dec!(10.00), "Cups").await;

    let carts = &app.state.services.carts;
    carts
        .add_item("s3", cups.id, &cups.name, cups.price, 1)
        .await
        .expect("add");

    // A stale code can sit on the snapshot if validation rules change
    // between apply and checkout; checkout re-validates.
    let mut snapshot = carts.snapshot("s3");
    snapshot.discount_code = Some("EXPIRED99".to_string());

    let err = app
        .state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .expect_err("stale code must be rejected");
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert!(Order::find().all(&*app.state.db).await.expect("query").is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn failed_item_write_leaves_no_orphan_order() {
    let app = spawn_app().await;
    let user = customer();
    let cups = app.seed_product("Foam Cups", dec!(10.00), "Cups").await;

    let carts = &app.state.services.carts;
    carts
        .add_item("atomic", cups.id, &cups.name, cups.price, 1)
        .await
        .expect("add");
    let snapshot = carts.snapshot("atomic");

    // Force the item insert to fail after the header insert by hiding
    // the order_items table.
    app.state
        .db
        .execute_unprepared("ALTER TABLE order_items RENAME TO order_items_hidden")
        .await
        .expect("rename table");

    let result = app
        .state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await;
    assert!(result.is_err());

    app.state
        .db
        .execute_unprepared("ALTER TABLE order_items_hidden RENAME TO order_items")
        .await
        .expect("restore table");

    // The header write rolled back with the failed item write: no
    // zero-item order is visible afterwards, and the cart survives
    // for retry.
    assert!(Order::find().all(&*app.state.db).await.expect("query").is_empty());
    assert!(OrderItem::find()
        .all(&*app.state.db)
        .await
        .expect("query")
        .is_empty());
    assert_eq!(carts.snapshot("atomic").lines.len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn end_to_end_with_rejected_code() {
    let app = spawn_app().await;
    let user = customer();
    let a = app.seed_product("Portion Cups", dec!(5.00), "Cups").await;
    let b = app.seed_product("Paper Bowls", dec!(10.00), "Bowls").await;

    let carts = &app.state.services.carts;
    carts
        .add_item("e2e", a.id, &a.name, a.price, 2)
        .await
        .expect("add a");
    carts
        .add_item("e2e", b.id, &b.name, b.price, 1)
        .await
        .expect("add b");
    assert_eq!(carts.snapshot("e2e").subtotal, dec!(20.00));

    // The bogus code is rejected and cleared; checkout proceeds at
    // full price.
    carts
        .apply_discount("e2e", "X")
        .await
        .expect_err("invalid code");
    let snapshot = carts.snapshot("e2e");
    assert!(snapshot.discount_code.is_none());

    let receipt = app
        .state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .expect("checkout");
    assert_eq!(receipt.total, dec!(21.00));

    let order = Order::find_by_id(receipt.order_id)
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::Pending);

    let items = OrderItem::find().all(&*app.state.db).await.expect("query");
    assert_eq!(items.len(), 2);
    assert!(items
        .iter()
        .any(|i| i.product_id == a.id && i.price_at_purchase == dec!(5.00)));
    assert!(items
        .iter()
        .any(|i| i.product_id == b.id && i.price_at_purchase == dec!(10.00)));

    carts.clear("e2e").await.expect("clear");
    assert!(carts.snapshot("e2e").is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn checkout_removes_stored_cart_in_same_transaction() {
    let app = spawn_app().await;
    let user = customer();
    let napkins = app.seed_product("Dinner Napkins", dec!(3.00), "Napkins").await;

    let carts = &app.state.services.carts;
    carts.bind_user("s4", user.user_id).await.expect("bind");
    carts
        .add_item("s4", napkins.id, &napkins.name, napkins.price, 6)
        .await
        .expect("add");

    let snapshot = carts.snapshot("s4");
    app.state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .expect("checkout");

    use supplyfront_api::entities::{Cart, CartItem};
    assert!(Cart::find().all(&*app.state.db).await.expect("query").is_empty());
    assert!(CartItem::find()
        .all(&*app.state.db)
        .await
        .expect("query")
        .is_empty());
}
