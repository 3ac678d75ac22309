use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::DbPool;
use crate::entities::{order, Order, OrderModel, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Guards and applies order status transitions.
///
/// Two callers exist: back-office staff, who may move an order to any
/// status while it is not terminal, and the order's owner, who has a
/// single one-shot "pick up from store" action. Once an order reaches
/// `pickup` or `cancelled` nothing moves it again.
pub struct OrderStatusService {
    db: Arc<DbPool>,
    events: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DbPool>, events: EventSender) -> Self {
        Self { db, events }
    }

    async fn load(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    async fn apply(
        &self,
        current: OrderModel,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let old_status = current.status;
        let order_id = current.id;

        let mut active: order::ActiveModel = current.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(%order_id, from = %old_status, to = %new_status, "Order status changed");
        self.events
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Staff status update. Any target status is allowed as long as
    /// the order has not reached a terminal state.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn update_status(
        &self,
        caller: &CurrentUser,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only staff may update order status".to_string(),
            ));
        }

        let current = self.load(order_id).await?;
        if current.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order is {} and can no longer change status",
                current.status
            )));
        }
        if current.status == new_status {
            return Ok(current);
        }

        self.apply(current, new_status).await
    }

    /// Customer "pick up from store" action. Only the order's owner
    /// may invoke it, and only while the order is pending or
    /// processing.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn mark_for_pickup(
        &self,
        caller: &CurrentUser,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let current = self.load(order_id).await?;

        if current.user_id != caller.user_id {
            return Err(ServiceError::Forbidden(
                "Order belongs to a different customer".to_string(),
            ));
        }
        if !current.status.pickup_allowed() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order is {} and cannot be switched to pickup",
                current.status
            )));
        }

        self.apply(current, OrderStatus::Pickup).await
    }
}
