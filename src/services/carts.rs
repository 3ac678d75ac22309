use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart, cart_item, Cart, CartItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::pricing::PricingService;

/// One line of an in-memory session cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Point-in-time copy of a session cart, safe to hand out and to ship
/// to the persistence tier without holding any map guard.
#[derive(Debug, Clone, Serialize)]
pub struct CartSnapshot {
    pub session: String,
    pub lines: Vec<CartLine>,
    pub discount_code: Option<String>,
    pub user_id: Option<Uuid>,
    pub subtotal: Decimal,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionCart {
    lines: Vec<CartLine>,
    discount_code: Option<String>,
    user_id: Option<Uuid>,
}

impl SessionCart {
    fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    fn snapshot(&self, session: &str) -> CartSnapshot {
        CartSnapshot {
            session: session.to_string(),
            lines: self.lines.clone(),
            discount_code: self.discount_code.clone(),
            user_id: self.user_id,
            subtotal: self.subtotal(),
        }
    }
}

/// Persistence port for the remote cart tier.
///
/// The session map is authoritative; implementations receive full
/// snapshots and mirror them. Errors are reported but callers treat
/// them as advisory.
#[async_trait]
pub trait CartSync: Send + Sync {
    async fn persist(&self, user_id: Uuid, snapshot: &CartSnapshot) -> Result<(), ServiceError>;
    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError>;
}

/// Sync implementation backed by the carts/cart_items tables. Each
/// persist replaces the user's stored cart wholesale, which keeps the
/// remote tier a pure mirror of the session state.
pub struct DbCartSync {
    db: Arc<DbPool>,
}

impl DbCartSync {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartSync for DbCartSync {
    async fn persist(&self, user_id: Uuid, snapshot: &CartSnapshot) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let cart_id = match Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            Some(existing) => {
                let mut active: cart::ActiveModel = existing.clone().into();
                active.updated_at = Set(now);
                active.update(&txn).await?;
                existing.id
            }
            None => {
                let cart_id = Uuid::new_v4();
                cart::ActiveModel {
                    id: Set(cart_id),
                    user_id: Set(user_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                cart_id
            }
        };

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;

        for line in &snapshot.lines {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        debug!(%user_id, %cart_id, lines = snapshot.lines.len(), "Cart mirrored to database");
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        if let Some(existing) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(existing.id))
                .exec(&txn)
                .await?;
            Cart::delete_by_id(existing.id).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

/// Sync implementation that drops every snapshot. Used when no
/// persistence tier is configured and in unit tests.
pub struct NullCartSync;

#[async_trait]
impl CartSync for NullCartSync {
    async fn persist(&self, _user_id: Uuid, _snapshot: &CartSnapshot) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn clear(&self, _user_id: Uuid) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Session-keyed cart store.
///
/// Mutations land in the in-process map first and always succeed or
/// fail on their own merits; mirroring to the remote tier happens
/// afterwards and a failure there is logged, never propagated. Reads
/// are served from the map alone, so a client observes its own writes
/// immediately regardless of sync health.
pub struct CartService {
    carts: DashMap<String, SessionCart>,
    sync: Arc<dyn CartSync>,
    events: EventSender,
}

impl CartService {
    pub fn new(sync: Arc<dyn CartSync>, events: EventSender) -> Self {
        Self {
            carts: DashMap::new(),
            sync,
            events,
        }
    }

    /// Adds quantity of a product to the session cart, merging into an
    /// existing line for the same product. A non-positive quantity is
    /// a no-op; a line is never stored with quantity below 1.
    pub async fn add_item(
        &self,
        session: &str,
        product_id: Uuid,
        name: &str,
        unit_price: Decimal,
        quantity: i32,
    ) -> Result<CartSnapshot, ServiceError> {
        if quantity < 1 {
            return Ok(self.snapshot(session));
        }

        let snapshot = {
            let mut entry = self.carts.entry(session.to_string()).or_default();
            match entry.lines.iter_mut().find(|l| l.product_id == product_id) {
                Some(line) => line.quantity += quantity,
                None => entry.lines.push(CartLine {
                    product_id,
                    name: name.to_string(),
                    unit_price,
                    quantity,
                }),
            }
            entry.snapshot(session)
        };

        self.events
            .send_or_log(Event::CartItemAdded {
                session: session.to_string(),
                product_id,
                quantity,
            })
            .await;
        self.mirror(&snapshot).await;
        Ok(snapshot)
    }

    /// Sets the quantity of an existing line. A non-positive quantity
    /// normalizes to removal of the line.
    pub async fn update_quantity(
        &self,
        session: &str,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartSnapshot, ServiceError> {
        if quantity < 1 {
            return self.remove_item(session, product_id).await;
        }

        let snapshot = {
            let mut entry = self
                .carts
                .get_mut(session)
                .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;
            let line = entry
                .lines
                .iter_mut()
                .find(|l| l.product_id == product_id)
                .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;
            line.quantity = quantity;
            entry.snapshot(session)
        };

        self.mirror(&snapshot).await;
        Ok(snapshot)
    }

    /// Removes a line from the cart. Removing an absent line is a
    /// no-op so repeated deletes stay idempotent, and an unknown
    /// session never allocates a map entry.
    pub async fn remove_item(
        &self,
        session: &str,
        product_id: Uuid,
    ) -> Result<CartSnapshot, ServiceError> {
        let snapshot = match self.carts.get_mut(session) {
            Some(mut entry) => {
                entry.lines.retain(|l| l.product_id != product_id);
                entry.snapshot(session)
            }
            None => return Ok(self.snapshot(session)),
        };

        self.events
            .send_or_log(Event::CartItemRemoved {
                session: session.to_string(),
                product_id,
            })
            .await;
        self.mirror(&snapshot).await;
        Ok(snapshot)
    }

    /// Applies a discount code to the cart. The code is validated here
    /// and again when the checkout total is computed. An unrecognized
    /// code clears any previously applied code before the error is
    /// reported, so a failed apply never leaves a stale discount
    /// behind.
    pub async fn apply_discount(
        &self,
        session: &str,
        code: &str,
    ) -> Result<CartSnapshot, ServiceError> {
        if let Err(e) = PricingService::validate_code(code) {
            if let Some(mut entry) = self.carts.get_mut(session) {
                entry.discount_code = None;
            }
            return Err(e);
        }

        let snapshot = {
            let mut entry = self.carts.entry(session.to_string()).or_default();
            entry.discount_code = Some(code.to_string());
            entry.snapshot(session)
        };

        self.events
            .send_or_log(Event::DiscountApplied {
                session: session.to_string(),
                code: code.to_string(),
            })
            .await;
        Ok(snapshot)
    }

    /// Removes any applied discount code. An unknown session is a
    /// no-op that allocates nothing.
    pub async fn remove_discount(&self, session: &str) -> Result<CartSnapshot, ServiceError> {
        let snapshot = match self.carts.get_mut(session) {
            Some(mut entry) => {
                entry.discount_code = None;
                entry.snapshot(session)
            }
            None => return Ok(self.snapshot(session)),
        };
        Ok(snapshot)
    }

    /// Associates the session with an authenticated user so mutations
    /// start mirroring to that user's stored cart.
    pub async fn bind_user(&self, session: &str, user_id: Uuid) -> Result<CartSnapshot, ServiceError> {
        let snapshot = {
            let mut entry = self.carts.entry(session.to_string()).or_default();
            entry.user_id = Some(user_id);
            entry.snapshot(session)
        };
        self.mirror(&snapshot).await;
        Ok(snapshot)
    }

    /// Empties the cart and drops its discount code. The map entry is
    /// reclaimed outright; the session map must not grow with dead
    /// sessions.
    pub async fn clear(&self, session: &str) -> Result<(), ServiceError> {
        let user_id = self
            .carts
            .remove(session)
            .and_then(|(_, cart)| cart.user_id);

        self.events
            .send_or_log(Event::CartCleared {
                session: session.to_string(),
            })
            .await;

        if let Some(user_id) = user_id {
            if let Err(e) = self.sync.clear(user_id).await {
                warn!(session, %user_id, error = %e, "Remote cart clear failed; local state already cleared");
            }
        }
        Ok(())
    }

    /// Current cart contents. An unknown session reads as an empty
    /// cart rather than an error.
    pub fn snapshot(&self, session: &str) -> CartSnapshot {
        match self.carts.get(session) {
            Some(entry) => entry.snapshot(session),
            None => CartSnapshot {
                session: session.to_string(),
                lines: Vec::new(),
                discount_code: None,
                user_id: None,
                subtotal: Decimal::ZERO,
            },
        }
    }

    /// Mirrors a snapshot to the remote tier for bound sessions.
    /// Failures are logged and swallowed: the session cart already
    /// holds the authoritative state.
    async fn mirror(&self, snapshot: &CartSnapshot) {
        let Some(user_id) = snapshot.user_id else {
            return;
        };
        if let Err(e) = self.sync.persist(user_id, snapshot).await {
            warn!(
                session = %snapshot.session,
                %user_id,
                error = %e,
                "Remote cart sync failed; keeping local state"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    /// Sync stub that always fails, for exercising the advisory-sync
    /// contract.
    struct FailingSync;

    #[async_trait]
    impl CartSync for FailingSync {
        async fn persist(&self, _: Uuid, _: &CartSnapshot) -> Result<(), ServiceError> {
            Err(ServiceError::SyncFailure("injected".to_string()))
        }

        async fn clear(&self, _: Uuid) -> Result<(), ServiceError> {
            Err(ServiceError::SyncFailure("injected".to_string()))
        }
    }

    fn service_with(sync: Arc<dyn CartSync>) -> CartService {
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        CartService::new(sync, EventSender::new(tx))
    }

    fn service() -> CartService {
        service_with(Arc::new(NullCartSync))
    }

    #[tokio::test]
    async fn add_merges_lines_for_same_product() {
        let svc = service();
        let pid = Uuid::new_v4();

        svc.add_item("s1", pid, "Foam Cups", dec!(12.50), 2)
            .await
            .expect("add");
        let snap = svc
            .add_item("s1", pid, "Foam Cups", dec!(12.50), 3)
            .await
            .expect("add again");

        assert_eq!(snap.lines.len(), 1);
        assert_eq!(snap.lines[0].quantity, 5);
        assert_eq!(snap.subtotal, dec!(62.50));
    }

    #[tokio::test]
    async fn add_with_non_positive_quantity_is_a_no_op() {
        let svc = service();
        let pid = Uuid::new_v4();

        let snap = svc
            .add_item("s1", pid, "Bowls", dec!(5.00), 0)
            .await
            .expect("no-op");
        assert!(snap.is_empty());

        svc.add_item("s1", pid, "Bowls", dec!(5.00), 2)
            .await
            .expect("add");
        let snap = svc
            .add_item("s1", pid, "Bowls", dec!(5.00), -3)
            .await
            .expect("no-op");
        assert_eq!(snap.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn update_sets_quantity_exactly() {
        let svc = service();
        let pid = Uuid::new_v4();
        svc.add_item("s1", pid, "Napkins", dec!(3.00), 4)
            .await
            .expect("add");

        let snap = svc.update_quantity("s1", pid, 1).await.expect("update");
        assert_eq!(snap.lines[0].quantity, 1);
        assert_eq!(snap.subtotal, dec!(3.00));
    }

    #[tokio::test]
    async fn update_to_non_positive_quantity_removes_the_line() {
        let svc = service();
        let pid = Uuid::new_v4();
        svc.add_item("s1", pid, "Napkins", dec!(3.00), 4)
            .await
            .expect("add");

        let snap = svc.update_quantity("s1", pid, 0).await.expect("update");
        assert!(snap.is_empty());

        svc.add_item("s1", pid, "Napkins", dec!(3.00), 4)
            .await
            .expect("re-add");
        let snap = svc.update_quantity("s1", pid, -5).await.expect("update");
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn update_missing_line_is_not_found() {
        let svc = service();
        svc.add_item("s1", Uuid::new_v4(), "Cutlery", dec!(8.00), 1)
            .await
            .expect("add");

        let err = svc
            .update_quantity("s1", Uuid::new_v4(), 2)
            .await
            .expect_err("unknown product");
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let svc = service();
        let pid = Uuid::new_v4();
        svc.add_item("s1", pid, "Lids", dec!(2.00), 1)
            .await
            .expect("add");

        let snap = svc.remove_item("s1", pid).await.expect("remove");
        assert!(snap.is_empty());
        let snap = svc.remove_item("s1", pid).await.expect("remove again");
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let svc = service();
        svc.add_item("s1", Uuid::new_v4(), "Plates", dec!(10.00), 1)
            .await
            .expect("add");

        assert_eq!(svc.snapshot("s1").lines.len(), 1);
        assert!(svc.snapshot("s2").is_empty());
    }

    #[tokio::test]
    async fn discount_code_is_validated_on_apply() {
        let svc = service();
        let err = svc
            .apply_discount("s1", "BOGUS")
            .await
            .expect_err("unknown code");
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let snap = svc.apply_discount("s1", "SAVE10").await.expect("apply");
        assert_eq!(snap.discount_code.as_deref(), Some("SAVE10"));
    }

    #[tokio::test]
    async fn invalid_code_clears_a_previously_applied_one() {
        let svc = service();
        svc.apply_discount("s1", "SAVE10").await.expect("apply");

        svc.apply_discount("s1", "SAVE99")
            .await
            .expect_err("unknown code");
        assert!(svc.snapshot("s1").discount_code.is_none());
    }

    #[tokio::test]
    async fn clear_empties_cart_and_drops_code() {
        let svc = service();
        svc.add_item("s1", Uuid::new_v4(), "Trays", dec!(6.00), 2)
            .await
            .expect("add");
        svc.apply_discount("s1", "SAVE10").await.expect("apply");

        svc.clear("s1").await.expect("clear");
        let snap = svc.snapshot("s1");
        assert!(snap.is_empty());
        assert!(snap.discount_code.is_none());
    }

    #[tokio::test]
    async fn clear_reclaims_the_session_entry() {
        let svc = service();
        svc.add_item("s1", Uuid::new_v4(), "Trays", dec!(6.00), 2)
            .await
            .expect("add");
        assert!(svc.carts.contains_key("s1"));

        svc.clear("s1").await.expect("clear");
        assert!(!svc.carts.contains_key("s1"));
        assert!(svc.snapshot("s1").is_empty());
    }

    #[tokio::test]
    async fn non_creating_operations_allocate_no_session() {
        let svc = service();

        svc.remove_item("ghost", Uuid::new_v4())
            .await
            .expect("remove is a no-op");
        svc.remove_discount("ghost").await.expect("no-op");
        svc.apply_discount("ghost", "BOGUS")
            .await
            .expect_err("invalid code");
        svc.clear("ghost").await.expect("clear is a no-op");

        assert!(!svc.carts.contains_key("ghost"));
    }

    #[tokio::test]
    async fn failing_sync_never_surfaces_to_the_caller() {
        let svc = service_with(Arc::new(FailingSync));
        let user = Uuid::new_v4();
        let pid = Uuid::new_v4();

        svc.bind_user("s1", user).await.expect("bind");
        let snap = svc
            .add_item("s1", pid, "Foam Cups", dec!(12.50), 2)
            .await
            .expect("local write must succeed despite sync failure");
        assert_eq!(snap.lines.len(), 1);

        // Local state is still authoritative after the failed mirror.
        assert_eq!(svc.snapshot("s1").lines.len(), 1);
        svc.clear("s1").await.expect("clear swallows sync failure");
        assert!(svc.snapshot("s1").is_empty());
    }

    #[tokio::test]
    async fn unknown_session_reads_as_empty_cart() {
        let svc = service();
        let snap = svc.snapshot("never-seen");
        assert!(snap.is_empty());
        assert_eq!(snap.subtotal, Decimal::ZERO);
    }
}
