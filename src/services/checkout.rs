use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart, cart_item, order, order_item, Cart, CartItem, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartSnapshot;
use crate::services::pricing::{PriceQuote, PricingService};

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Turns a session cart into a persisted order.
///
/// The order header, its items, and the removal of the user's stored
/// cart commit in a single transaction, so a failure anywhere leaves
/// no partial order behind and the cart intact.
pub struct CheckoutService {
    db: Arc<DbPool>,
    pricing: PricingService,
    events: EventSender,
}

impl CheckoutService {
    pub fn new(db: Arc<DbPool>, pricing: PricingService, events: EventSender) -> Self {
        Self {
            db,
            pricing,
            events,
        }
    }

    /// Prices the snapshot without placing an order.
    pub fn quote(&self, snapshot: &CartSnapshot) -> Result<PriceQuote, ServiceError> {
        self.pricing
            .quote(snapshot.subtotal, snapshot.discount_code.as_deref())
    }

    /// Places an order from the given cart snapshot.
    ///
    /// Line prices are snapshotted into `price_at_purchase`; later
    /// catalog price changes never affect an existing order.
    #[tracing::instrument(skip(self, snapshot), fields(session = %snapshot.session))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        snapshot: &CartSnapshot,
    ) -> Result<CheckoutReceipt, ServiceError> {
        if snapshot.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cannot check out an empty cart".to_string(),
            ));
        }
        for line in &snapshot.lines {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Invalid quantity for product {}",
                    line.product_id
                )));
            }
        }

        let quote = self.quote(snapshot)?;
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            order_date: Set(now),
            status: Set(OrderStatus::Pending),
            payment_status: Set("pending".to_string()),
            subtotal: Set(quote.subtotal),
            discount_amount: Set(quote.discount_amount),
            tax_amount: Set(quote.tax_amount),
            total_amount: Set(quote.total),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for line in &snapshot.lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                price_at_purchase: Set(line.unit_price),
            }
            .insert(&txn)
            .await?;
        }

        // Drop the stored cart in the same transaction so the order
        // and the cart removal commit or roll back together.
        if let Some(stored) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(stored.id))
                .exec(&txn)
                .await?;
            Cart::delete_by_id(stored.id).exec(&txn).await?;
        }

        txn.commit().await?;

        info!(%order_id, %user_id, total = %quote.total, "Order placed");
        self.events.send_or_log(Event::OrderCreated(order_id)).await;

        Ok(CheckoutReceipt {
            order_id,
            subtotal: quote.subtotal,
            discount_amount: quote.discount_amount,
            tax_amount: quote.tax_amount,
            total: quote.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::carts::CartLine;
    use rust_decimal_macros::dec;

    fn snapshot(lines: Vec<CartLine>, code: Option<&str>) -> CartSnapshot {
        let subtotal = lines.iter().map(CartLine::line_total).sum();
        CartSnapshot {
            session: "s1".to_string(),
            lines,
            discount_code: code.map(str::to_string),
            user_id: None,
            subtotal,
        }
    }

    fn line(price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            name: "Foam Cups".to_string(),
            unit_price: price,
            quantity,
        }
    }

    #[test]
    fn quote_applies_discount_and_tax() {
        let pricing = PricingService::new(0.05).expect("rate");
        let snap = snapshot(vec![line(dec!(50.00), 2)], Some("SAVE10"));

        let quote = pricing
            .quote(snap.subtotal, snap.discount_code.as_deref())
            .expect("quote");
        assert_eq!(quote.subtotal, dec!(100.00));
        assert_eq!(quote.discount_amount, dec!(10.00));
        assert_eq!(quote.tax_amount, dec!(5.00));
        assert_eq!(quote.total, dec!(95.00));
    }

    #[test]
    fn empty_snapshot_is_flagged_before_any_db_work() {
        let snap = snapshot(vec![], None);
        assert!(snap.is_empty());
    }
}
