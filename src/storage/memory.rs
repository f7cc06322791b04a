use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::rating::{RatingSummary, RatingTotals};
use crate::cms::CmsResource;
use crate::entities::{cms_entry, cms_setting, product, review};
use crate::storage::{
    sort_entries, sort_products, CatalogStorage, CmsStorage, EntryQuery, Page, ProductQuery,
    ReviewQuery, StorageError, StorageResult, DUPLICATE_REVIEW,
};

/// Process-local store for tests and database-less development.
#[derive(Default)]
pub struct MemoryStorage {
    products: DashMap<Uuid, product::Model>,
    reviews: DashMap<Uuid, review::Model>,
    review_keys: DashMap<(Uuid, String), Uuid>,
    entries: RwLock<HashMap<Uuid, cms_entry::Model>>,
    settings: DashMap<String, cms_setting::Model>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStorage for MemoryStorage {
    async fn insert_product(&self, product: product::Model) -> StorageResult<product::Model> {
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<product::Model>> {
        Ok(self.products.get(&id).map(|p| p.clone()))
    }

    async fn list_products(&self, query: &ProductQuery) -> StorageResult<Page<product::Model>> {
        let mut matching: Vec<product::Model> = self
            .products
            .iter()
            .filter(|p| query.matches(p.value()))
            .map(|p| p.clone())
            .collect();
        sort_products(&mut matching, query.sort);
        Ok(Page::from_sorted(matching, query.page, query.limit))
    }

    async fn update_product(
        &self,
        product: product::Model,
    ) -> StorageResult<Option<product::Model>> {
        Ok(self.products.get_mut(&product.id).map(|mut stored| {
            let (average_rating, review_count) = (stored.average_rating, stored.review_count);
            *stored = product::Model {
                average_rating,
                review_count,
                ..product
            };
            stored.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> StorageResult<bool> {
        Ok(self.products.remove(&id).is_some())
    }

    async fn set_rating(&self, id: Uuid, summary: RatingSummary) -> StorageResult<bool> {
        Ok(match self.products.get_mut(&id) {
            Some(mut product) => {
                product.average_rating = summary.average_rating;
                product.review_count = summary.review_count as i32;
                true
            }
            None => false,
        })
    }

    async fn insert_review(&self, review: review::Model) -> StorageResult<review::Model> {
        let key = (review.product_id, review.customer_email.clone());
        match self.review_keys.entry(key) {
            Entry::Occupied(_) => Err(StorageError::Duplicate(DUPLICATE_REVIEW)),
            Entry::Vacant(slot) => {
                slot.insert(review.id);
                self.reviews.insert(review.id, review.clone());
                Ok(review)
            }
        }
    }

    async fn get_review(&self, id: Uuid) -> StorageResult<Option<review::Model>> {
        Ok(self.reviews.get(&id).map(|r| r.clone()))
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> StorageResult<Page<review::Model>> {
        let mut matching: Vec<review::Model> = self
            .reviews
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_sorted(matching, query.page, query.limit))
    }

    async fn set_review_approval(
        &self,
        id: Uuid,
        approved: bool,
    ) -> StorageResult<Option<review::Model>> {
        Ok(self.reviews.get_mut(&id).map(|mut review| {
            review.is_approved = approved;
            review.updated_at = Utc::now();
            review.clone()
        }))
    }

    async fn delete_review(&self, id: Uuid) -> StorageResult<Option<review::Model>> {
        let removed = self.reviews.remove(&id).map(|(_, review)| review);
        if let Some(review) = &removed {
            self.review_keys
                .remove(&(review.product_id, review.customer_email.clone()));
        }
        Ok(removed)
    }

    async fn delete_reviews_for_product(&self, product_id: Uuid) -> StorageResult<u64> {
        let ids: Vec<Uuid> = self
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| r.id)
            .collect();
        for id in &ids {
            self.delete_review(*id).await?;
        }
        Ok(ids.len() as u64)
    }

    async fn approved_rating_totals(&self, product_id: Uuid) -> StorageResult<RatingTotals> {
        Ok(RatingTotals::from_ratings(
            self.reviews
                .iter()
                .filter(|r| r.product_id == product_id && r.is_approved)
                .map(|r| r.rating),
        ))
    }
}

#[async_trait]
impl CmsStorage for MemoryStorage {
    async fn insert_entry(&self, entry: cms_entry::Model) -> StorageResult<cms_entry::Model> {
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
    ) -> StorageResult<Option<cms_entry::Model>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&id)
            .filter(|e| e.resource == resource)
            .cloned())
    }

    async fn list_entries(
        &self,
        resource: CmsResource,
        query: &EntryQuery,
    ) -> StorageResult<Page<cms_entry::Model>> {
        let mut matching: Vec<cms_entry::Model> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.resource == resource && query.active.map_or(true, |a| e.is_active == a))
            .cloned()
            .collect();
        sort_entries(&mut matching, query.sort);
        Ok(Page::from_sorted(matching, query.page, query.limit))
    }

    async fn update_entry(
        &self,
        entry: cms_entry::Model,
    ) -> StorageResult<Option<cms_entry::Model>> {
        let mut entries = self.entries.write().await;
        Ok(match entries.get_mut(&entry.id) {
            Some(stored) if stored.resource == entry.resource => {
                *stored = cms_entry::Model {
                    position: stored.position,
                    ..entry
                };
                Some(stored.clone())
            }
            _ => None,
        })
    }

    async fn delete_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
    ) -> StorageResult<Option<cms_entry::Model>> {
        let mut entries = self.entries.write().await;
        if entries.get(&id).is_some_and(|e| e.resource == resource) {
            Ok(entries.remove(&id))
        } else {
            Ok(None)
        }
    }

    async fn next_position(&self, resource: CmsResource) -> StorageResult<i32> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.resource == resource)
            .map(|e| e.position + 1)
            .max()
            .unwrap_or(0))
    }

    async fn write_positions(
        &self,
        resource: CmsResource,
        positions: &[(Uuid, i32)],
    ) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        for (id, position) in positions {
            if let Some(entry) = entries.get_mut(id).filter(|e| e.resource == resource) {
                entry.position = *position;
                entry.updated_at = now;
            }
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StorageResult<Option<cms_setting::Model>> {
        Ok(self.settings.get(key).map(|s| s.clone()))
    }

    async fn insert_setting_if_absent(
        &self,
        setting: cms_setting::Model,
    ) -> StorageResult<cms_setting::Model> {
        Ok(self
            .settings
            .entry(setting.key.clone())
            .or_insert(setting)
            .clone())
    }

    async fn save_setting(&self, setting: cms_setting::Model) -> StorageResult<cms_setting::Model> {
        self.settings.insert(setting.key.clone(), setting.clone());
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product::Category;
    use crate::entities::{MediaMap, Specifications, StringList};
    use anyhow::Result;
    use serde_json::json;

    fn product(title: &str, price: f64) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            category: Category::Inverters,
            new_price: price.to_string(),
            old_price: None,
            price_value: price,
            stock: 3,
            is_active: true,
            is_featured: false,
            average_rating: 0.0,
            review_count: 0,
            specifications: Specifications::default(),
            images: StringList::default(),
            tags: StringList::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn review(product_id: Uuid, email: &str, rating: i32, approved: bool) -> review::Model {
        let now = Utc::now();
        review::Model {
            id: Uuid::new_v4(),
            product_id,
            customer_name: "Ravi".to_string(),
            customer_email: email.to_string(),
            rating,
            title: None,
            comment: "Good".to_string(),
            is_approved: approved,
            created_at: now,
            updated_at: now,
        }
    }

    fn entry(resource: CmsResource, position: i32) -> cms_entry::Model {
        let now = Utc::now();
        cms_entry::Model {
            id: Uuid::new_v4(),
            resource,
            position,
            is_active: true,
            data: json!({ "name": format!("entry {position}") }),
            media: MediaMap::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_product_crud() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut p = storage.insert_product(product("String Inverter", 100.0)).await?;

        p.title = "Hybrid Inverter".to_string();
        let updated = storage.update_product(p.clone()).await?;
        assert_eq!(updated.unwrap().title, "Hybrid Inverter");

        assert!(storage.delete_product(p.id).await?);
        assert!(storage.get_product(p.id).await?.is_none());
        assert!(storage.update_product(p).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_sorts_and_pages() -> Result<()> {
        let storage = MemoryStorage::new();
        for (title, price) in [("a", 300.0), ("b", 100.0), ("c", 200.0)] {
            storage.insert_product(product(title, price)).await?;
        }

        let query = ProductQuery {
            sort: crate::storage::ProductSort::PriceAsc,
            page: 1,
            limit: Some(2),
            ..Default::default()
        };
        let page = storage.list_products(&query).await?;
        let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_oldest_first() -> Result<()> {
        let storage = MemoryStorage::new();
        let start = Utc::now();
        for (offset, title) in [(2, "third"), (0, "first"), (1, "second")] {
            let mut p = product(title, 100.0);
            p.created_at = start + chrono::Duration::seconds(offset);
            storage.insert_product(p).await?;
        }

        let query = ProductQuery {
            sort: crate::storage::ProductSort::Oldest,
            ..Default::default()
        };
        let page = storage.list_products(&query).await?;
        let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_keeps_stored_rating() -> Result<()> {
        let storage = MemoryStorage::new();
        let stale = storage.insert_product(product("Hybrid Inverter", 100.0)).await?;

        let summary = RatingSummary {
            average_rating: 4.5,
            review_count: 2,
        };
        assert!(storage.set_rating(stale.id, summary).await?);

        let mut edited = stale.clone();
        edited.stock = 9;
        let updated = storage.update_product(edited).await?.unwrap();
        assert_eq!(updated.stock, 9);
        assert_eq!(updated.average_rating, 4.5);
        assert_eq!(updated.review_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_entry_keeps_stored_position() -> Result<()> {
        let storage = MemoryStorage::new();
        let stale = storage.insert_entry(entry(CmsResource::Hero, 0)).await?;
        storage
            .write_positions(CmsResource::Hero, &[(stale.id, 3)])
            .await?;

        let mut edited = stale.clone();
        edited.data = json!({ "name": "renamed" });
        let updated = storage.update_entry(edited).await?.unwrap();
        assert_eq!(updated.data["name"], "renamed");
        assert_eq!(updated.position, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_review_key_is_released_on_delete() -> Result<()> {
        let storage = MemoryStorage::new();
        let product_id = Uuid::new_v4();

        let first = storage
            .insert_review(review(product_id, "a@x.io", 4, false))
            .await?;
        let dup = storage
            .insert_review(review(product_id, "a@x.io", 5, false))
            .await;
        assert!(matches!(dup, Err(StorageError::Duplicate(_))));

        storage.delete_review(first.id).await?;
        storage
            .insert_review(review(product_id, "a@x.io", 5, false))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rating_totals_only_count_approved() -> Result<()> {
        let storage = MemoryStorage::new();
        let product_id = Uuid::new_v4();
        storage.insert_review(review(product_id, "a@x.io", 5, true)).await?;
        storage.insert_review(review(product_id, "b@x.io", 3, true)).await?;
        storage.insert_review(review(product_id, "c@x.io", 1, false)).await?;
        storage.insert_review(review(Uuid::new_v4(), "a@x.io", 1, true)).await?;

        let totals = storage.approved_rating_totals(product_id).await?;
        assert_eq!(totals, RatingTotals { count: 2, sum: 8 });
        Ok(())
    }

    #[tokio::test]
    async fn test_set_rating_on_missing_product() -> Result<()> {
        let storage = MemoryStorage::new();
        let summary = RatingSummary {
            average_rating: 4.0,
            review_count: 1,
        };
        assert!(!storage.set_rating(Uuid::new_v4(), summary).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_entries_are_scoped_by_resource() -> Result<()> {
        let storage = MemoryStorage::new();
        let director = storage.insert_entry(entry(CmsResource::Director, 0)).await?;
        storage.insert_entry(entry(CmsResource::TeamMember, 0)).await?;

        assert!(storage
            .get_entry(CmsResource::TeamMember, director.id)
            .await?
            .is_none());
        assert!(storage
            .delete_entry(CmsResource::TeamMember, director.id)
            .await?
            .is_none());

        let directors = storage
            .list_entries(CmsResource::Director, &EntryQuery::default())
            .await?;
        assert_eq!(directors.items.len(), 1);
        assert_eq!(storage.next_position(CmsResource::Director).await?, 1);
        assert_eq!(storage.next_position(CmsResource::Hero).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_setting_insert_if_absent_keeps_first() -> Result<()> {
        let storage = MemoryStorage::new();
        let setting = |value: &str| cms_setting::Model {
            key: "about".to_string(),
            data: json!({ "title": value }),
            media: MediaMap::default(),
            updated_at: Utc::now(),
        };

        let first = storage.insert_setting_if_absent(setting("first")).await?;
        let second = storage.insert_setting_if_absent(setting("second")).await?;
        assert_eq!(first.data, second.data);

        storage.save_setting(setting("saved")).await?;
        let stored = storage.get_setting("about").await?.unwrap();
        assert_eq!(stored.data["title"], "saved");
        Ok(())
    }
}
