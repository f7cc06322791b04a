use async_trait::async_trait;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::rating::{RatingSummary, RatingTotals};
use crate::cms::CmsResource;
use crate::entities::product::Category;
use crate::entities::{cms_entry, cms_setting, product, review};

pub mod memory;
pub mod postgres;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    Duplicate(&'static str),

    #[error(transparent)]
    Database(#[from] DbErr),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub const DUPLICATE_REVIEW: &str = "You have already reviewed this product";

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: Option<u64>,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: Option<u64>) -> Self {
        let total_pages = match limit {
            Some(limit) if limit > 0 => total.div_ceil(limit),
            _ => u64::from(total > 0),
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    /// Slices an already filtered and sorted list.
    pub fn from_sorted(all: Vec<T>, page: u64, limit: Option<u64>) -> Self {
        let total = all.len() as u64;
        let items = match limit {
            Some(limit) => all
                .into_iter()
                .skip(((page.max(1) - 1) * limit) as usize)
                .take(limit as usize)
                .collect(),
            None => all,
        };
        Self::new(items, total, page.max(1), limit)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    /// Creation order; ties broken by id.
    Oldest,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub category: Option<Category>,
    pub featured: Option<bool>,
    pub active: Option<bool>,
    pub in_stock: bool,
    pub search: Option<String>,
    pub sort: ProductSort,
    pub page: u64,
    pub limit: Option<u64>,
}

impl ProductQuery {
    pub fn matches(&self, product: &product::Model) -> bool {
        self.category.map_or(true, |c| product.category == c)
            && self.featured.map_or(true, |f| product.is_featured == f)
            && self.active.map_or(true, |a| product.is_active == a)
            && (!self.in_stock || product.stock > 0)
            && self.search.as_deref().map_or(true, |term| {
                let term = term.to_lowercase();
                product.title.to_lowercase().contains(&term)
                    || product.description.to_lowercase().contains(&term)
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewQuery {
    pub product_id: Option<Uuid>,
    pub approved: Option<bool>,
    pub page: u64,
    pub limit: Option<u64>,
}

impl ReviewQuery {
    pub fn matches(&self, review: &review::Model) -> bool {
        self.product_id.map_or(true, |id| review.product_id == id)
            && self.approved.map_or(true, |a| review.is_approved == a)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySort {
    #[default]
    Order,
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub active: Option<bool>,
    pub sort: EntrySort,
    pub page: u64,
    pub limit: Option<u64>,
}

#[async_trait]
pub trait CatalogStorage: Send + Sync {
    async fn insert_product(&self, product: product::Model) -> StorageResult<product::Model>;
    async fn get_product(&self, id: Uuid) -> StorageResult<Option<product::Model>>;
    async fn list_products(&self, query: &ProductQuery) -> StorageResult<Page<product::Model>>;
    /// Replaces the stored product; `None` when it no longer exists.
    async fn update_product(&self, product: product::Model)
        -> StorageResult<Option<product::Model>>;
    async fn delete_product(&self, id: Uuid) -> StorageResult<bool>;
    /// Writes the derived rating fields. `false` when the product is gone.
    async fn set_rating(&self, id: Uuid, summary: RatingSummary) -> StorageResult<bool>;

    /// Fails with [`StorageError::Duplicate`] when the product already has a
    /// review from the same email.
    async fn insert_review(&self, review: review::Model) -> StorageResult<review::Model>;
    async fn get_review(&self, id: Uuid) -> StorageResult<Option<review::Model>>;
    async fn list_reviews(&self, query: &ReviewQuery) -> StorageResult<Page<review::Model>>;
    async fn set_review_approval(
        &self,
        id: Uuid,
        approved: bool,
    ) -> StorageResult<Option<review::Model>>;
    async fn delete_review(&self, id: Uuid) -> StorageResult<Option<review::Model>>;
    async fn delete_reviews_for_product(&self, product_id: Uuid) -> StorageResult<u64>;
    async fn approved_rating_totals(&self, product_id: Uuid) -> StorageResult<RatingTotals>;
}

#[async_trait]
pub trait CmsStorage: Send + Sync {
    async fn insert_entry(&self, entry: cms_entry::Model) -> StorageResult<cms_entry::Model>;
    async fn get_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
    ) -> StorageResult<Option<cms_entry::Model>>;
    async fn list_entries(
        &self,
        resource: CmsResource,
        query: &EntryQuery,
    ) -> StorageResult<Page<cms_entry::Model>>;
    async fn update_entry(&self, entry: cms_entry::Model)
        -> StorageResult<Option<cms_entry::Model>>;
    async fn delete_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
    ) -> StorageResult<Option<cms_entry::Model>>;
    async fn next_position(&self, resource: CmsResource) -> StorageResult<i32>;
    /// Writes every `(id, position)` pair as one atomic batch.
    async fn write_positions(
        &self,
        resource: CmsResource,
        positions: &[(Uuid, i32)],
    ) -> StorageResult<()>;

    async fn get_setting(&self, key: &str) -> StorageResult<Option<cms_setting::Model>>;
    /// Inserts `setting` unless its key exists; returns whichever is stored.
    async fn insert_setting_if_absent(
        &self,
        setting: cms_setting::Model,
    ) -> StorageResult<cms_setting::Model>;
    async fn save_setting(&self, setting: cms_setting::Model) -> StorageResult<cms_setting::Model>;
}

/// Sorts CMS entries the way listings present them.
pub fn sort_entries(entries: &mut [cms_entry::Model], sort: EntrySort) {
    match sort {
        EntrySort::Order => entries.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        }),
        EntrySort::Newest => entries.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        EntrySort::Oldest => entries.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }
}

pub fn sort_products(products: &mut [product::Model], sort: ProductSort) {
    match sort {
        ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        ProductSort::PriceAsc => products.sort_by(|a, b| a.price_value.total_cmp(&b.price_value)),
        ProductSort::PriceDesc => products.sort_by(|a, b| b.price_value.total_cmp(&a.price_value)),
        ProductSort::Rating => products.sort_by(|a, b| {
            b.average_rating
                .total_cmp(&a.average_rating)
                .then(b.review_count.cmp(&a.review_count))
        }),
        ProductSort::Oldest => {
            products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        }
    }
}
