use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::DbPool;
use crate::entities::{order, order_item, Order, OrderItem, OrderItemModel, OrderModel};
use crate::errors::ServiceError;

/// An order header with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// One page of order headers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderModel>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Read-side order queries with ownership enforcement.
pub struct OrderQueryService {
    db: Arc<DbPool>,
}

impl OrderQueryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Fetches one order with its items. Only the owner or staff may
    /// read it.
    pub async fn get_order(
        &self,
        caller: &CurrentUser,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.user_id != caller.user_id && !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Order belongs to a different customer".to_string(),
            ));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Lists the caller's own orders, newest first.
    pub async fn list_for_user(
        &self,
        caller: &CurrentUser,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);

        let paginator = Order::find()
            .filter(order::Column::UserId.eq(caller.user_id))
            .order_by_desc(order::Column::OrderDate)
            .paginate(&*self.db, per_page);

        let totals = paginator.num_items_and_pages().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderPage {
            orders,
            page,
            per_page,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Lists every order in the system, newest first. Staff only.
    pub async fn list_all(
        &self,
        caller: &CurrentUser,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only staff may list all orders".to_string(),
            ));
        }

        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);

        let paginator = Order::find()
            .order_by_desc(order::Column::OrderDate)
            .paginate(&*self.db, per_page);

        let totals = paginator.num_items_and_pages().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderPage {
            orders,
            page,
            per_page,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }
}
