use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, Set};
use std::sync::Arc;
use uuid::Uuid;

use supplyfront_api::auth::CurrentUser;
use supplyfront_api::config::AppConfig;
use supplyfront_api::db::run_migrations;
use supplyfront_api::entities::{product, ProductModel};
use supplyfront_api::events::{process_events, EventSender};
use supplyfront_api::AppState;

/// In-process application wired against an in-memory SQLite database.
pub struct TestApp {
    pub state: Arc<AppState>,
}

pub async fn spawn_app() -> TestApp {
    // A single connection keeps every query on the same in-memory
    // database.
    let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1);
    let db = Database::connect(opt)
        .await
        .expect("in-memory sqlite connects");
    run_migrations(&db).await.expect("migrations apply");

    let (tx, rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(process_events(rx));

    let config = AppConfig::new(
        "sqlite::memory:".to_string(),
        "integration-test-secret-thats-long-enough".to_string(),
        "127.0.0.1".to_string(),
        0,
        "test".to_string(),
    );

    let state = AppState::new(Arc::new(db), config, EventSender::new(tx)).expect("app state");
    TestApp {
        state: Arc::new(state),
    }
}

impl TestApp {
    pub async fn seed_product(&self, name: &str, price: Decimal, category: &str) -> ProductModel {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            category: Set(category.to_string()),
            material: Set(None),
            quantity_per_case: Set(Some(100)),
            stock: Set(500),
            image_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("product inserts")
    }
}

pub fn customer() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        roles: vec!["customer".to_string()],
    }
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        roles: vec!["admin".to_string()],
    }
}
