mod common;

use common::spawn_app;
use rust_decimal_macros::dec;
use supplyfront_api::errors::ServiceError;
use supplyfront_api::services::catalog::ProductFilter;
use uuid::Uuid;

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn list_filters_by_category_and_name() {
    let app = spawn_app().await;
    app.seed_product("Foam Cups 16oz", dec!(12.50), "Cups").await;
    app.seed_product("Paper Cups 8oz", dec!(9.00), "Cups").await;
    app.seed_product("Paper Bowls", dec!(8.00), "Bowls").await;

    let catalog = &app.state.services.catalog;

    let cups = catalog
        .list_products(&ProductFilter {
            category: Some("Cups".to_string()),
            ..Default::default()
        })
        .await
        .expect("list");
    assert_eq!(cups.total_items, 2);

    let paper = catalog
        .list_products(&ProductFilter {
            search: Some("Paper".to_string()),
            ..Default::default()
        })
        .await
        .expect("list");
    assert_eq!(paper.total_items, 2);

    let paper_cups = catalog
        .list_products(&ProductFilter {
            category: Some("Cups".to_string()),
            search: Some("Paper".to_string()),
            ..Default::default()
        })
        .await
        .expect("list");
    assert_eq!(paper_cups.total_items, 1);
    assert_eq!(paper_cups.products[0].name, "Paper Cups 8oz");
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn pagination_caps_page_size() {
    let app = spawn_app().await;
    for i in 0..5 {
        app.seed_product(&format!("Item {}", i), dec!(1.00), "Containers")
            .await;
    }

    let page = app
        .state
        .services
        .catalog
        .list_products(&ProductFilter {
            page: Some(2),
            per_page: Some(2),
            ..Default::default()
        })
        .await
        .expect("list");

    assert_eq!(page.products.len(), 2);
    assert_eq!(page.total_items, 5);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn categories_are_distinct_and_sorted() {
    let app = spawn_app().await;
    app.seed_product("Foam Cups", dec!(12.50), "Cups").await;
    app.seed_product("Paper Cups", dec!(9.00), "Cups").await;
    app.seed_product("Paper Bowls", dec!(8.00), "Bowls").await;

    let categories = app
        .state
        .services
        .catalog
        .list_categories()
        .await
        .expect("categories");
    assert_eq!(categories, vec!["Bowls".to_string(), "Cups".to_string()]);
}

#[tokio::test]
#[cfg_attr(not(feature = "db-tests"), ignore)]
async fn unknown_product_is_not_found() {
    let app = spawn_app().await;

    let err = app
        .state
        .services
        .catalog
        .get_product(Uuid::new_v4())
        .await
        .expect_err("unknown product");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
