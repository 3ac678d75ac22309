use sea_orm::{ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{product, Product, ProductModel};
use crate::errors::ServiceError;

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

/// Catalog listing filter. All fields optional; absent fields match
/// everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Exact category match (e.g. "Cups", "Containers")
    pub category: Option<String>,
    /// Case-insensitive substring match on the product name
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// One page of catalog products.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductModel>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Read-only product catalog queries.
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ServiceError> {
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let mut condition = Condition::all();
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            condition = condition.add(product::Column::Category.eq(category));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            condition = condition.add(product::Column::Name.contains(search.trim()));
        }

        let paginator = Product::find()
            .filter(condition)
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let totals = paginator.num_items_and_pages().await?;
        let products = paginator.fetch_page(page - 1).await?;

        Ok(ProductPage {
            products,
            page,
            per_page,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Distinct category names, for storefront navigation.
    pub async fn list_categories(&self) -> Result<Vec<String>, ServiceError> {
        use sea_orm::QuerySelect;

        let categories: Vec<String> = Product::find()
            .select_only()
            .column(product::Column::Category)
            .distinct()
            .order_by_asc(product::Column::Category)
            .into_tuple()
            .all(&*self.db)
            .await?;
        Ok(categories)
    }
}
