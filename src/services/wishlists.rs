use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    wishlist_item, Product, ProductModel, WishlistItem, WishlistItemModel,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Outcome of a wishlist toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WishlistToggle {
    Added,
    Removed,
}

/// A wishlist entry joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub product: ProductModel,
    pub added_at: chrono::DateTime<chrono::Utc>,
}

/// Per-user wishlist, unique on (user, product). A toggle adds the
/// product when absent and removes it when present.
pub struct WishlistService {
    db: Arc<DbPool>,
    events: EventSender,
}

impl WishlistService {
    pub fn new(db: Arc<DbPool>, events: EventSender) -> Self {
        Self { db, events }
    }

    #[tracing::instrument(skip(self))]
    pub async fn toggle(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishlistToggle, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(entry) => {
                entry.delete(&*self.db).await?;
                self.events
                    .send_or_log(Event::WishlistItemRemoved {
                        user_id,
                        product_id,
                    })
                    .await;
                Ok(WishlistToggle::Removed)
            }
            None => {
                wishlist_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    added_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?;
                self.events
                    .send_or_log(Event::WishlistItemAdded {
                        user_id,
                        product_id,
                    })
                    .await;
                Ok(WishlistToggle::Added)
            }
        }
    }

    /// Lists the user's wishlist with product details, newest first.
    /// Entries whose product has since been deleted are skipped.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, ServiceError> {
        let rows: Vec<(WishlistItemModel, Option<ProductModel>)> = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .order_by_desc(wishlist_item::Column::AddedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(item, product)| {
                product.map(|product| WishlistEntry {
                    id: item.id,
                    product,
                    added_at: item.added_at,
                })
            })
            .collect())
    }

    /// True when the product is on the user's wishlist.
    pub async fn contains(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError> {
        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;
        Ok(existing.is_some())
    }
}
