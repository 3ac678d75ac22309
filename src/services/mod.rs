pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod order_status;
pub mod orders;
pub mod pricing;
pub mod wishlists;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

use carts::{CartService, DbCartSync};
use catalog::CatalogService;
use checkout::CheckoutService;
use order_status::OrderStatusService;
use orders::OrderQueryService;
use pricing::PricingService;
use wishlists::WishlistService;

/// Service registry shared by all handlers.
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub order_status: Arc<OrderStatusService>,
    pub orders: Arc<OrderQueryService>,
    pub wishlists: Arc<WishlistService>,
}

impl AppServices {
    pub fn build(
        db: Arc<DbPool>,
        config: &AppConfig,
        events: EventSender,
    ) -> Result<Self, ServiceError> {
        let pricing = PricingService::new(config.default_tax_rate)?;
        let cart_sync = Arc::new(DbCartSync::new(db.clone()));

        Ok(Self {
            carts: Arc::new(CartService::new(cart_sync, events.clone())),
            catalog: Arc::new(CatalogService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(db.clone(), pricing, events.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone(), events.clone())),
            orders: Arc::new(OrderQueryService::new(db.clone())),
            wishlists: Arc::new(WishlistService::new(db, events)),
        })
    }
}
