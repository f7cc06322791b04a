pub mod rating;
pub mod recommend;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::product::{self, Category};
use crate::entities::{review, Specifications, StringList};
use crate::error::{AppError, AppResult, FieldError};
use crate::form::FormFields;
use crate::models::ActivityEvent;
use crate::search::ProductIndex;
use crate::storage::{CatalogStorage, Page, ProductQuery, ProductSort, ReviewQuery};
use crate::uploads::{UploadField, UploadStore, UploadedFile};
use rating::{RatingSummary, RatingTotals};

const PRODUCT_UPLOAD_DIR: &str = "products";
const SEARCH_LIMIT: usize = 20;

/// Product catalog and review moderation.
pub struct Catalog {
    storage: Arc<dyn CatalogStorage>,
    index: Arc<dyn ProductIndex>,
    uploads: UploadStore,
    notification_tx: broadcast::Sender<ActivityEvent>,
}

impl Catalog {
    pub fn new(
        storage: Arc<dyn CatalogStorage>,
        index: Arc<dyn ProductIndex>,
        uploads: UploadStore,
        notification_tx: broadcast::Sender<ActivityEvent>,
    ) -> Self {
        Self {
            storage,
            index,
            uploads,
            notification_tx,
        }
    }

    fn notify(&self, event: ActivityEvent) {
        let _ = self.notification_tx.send(event);
    }

    /// Re-indexes every stored product. Run once at startup.
    pub async fn rebuild_index(&self) -> AppResult<usize> {
        let all = self.storage.list_products(&ProductQuery::default()).await?;
        for product in &all.items {
            self.index.index_product(product).await?;
        }
        info!(count = all.items.len(), "search index rebuilt");
        Ok(all.items.len())
    }

    pub async fn create_product(
        &self,
        fields: FormFields,
        files: Vec<UploadedFile>,
    ) -> AppResult<product::Model> {
        let input = ProductInput::parse(&fields, true)?;
        let images = self.store_images(&files).await?;

        let now = Utc::now();
        let new_price = input.new_price.unwrap_or_default();
        let product = product::Model {
            id: Uuid::new_v4(),
            title: input.title.unwrap_or_default(),
            description: input.description.unwrap_or_default(),
            category: input.category.unwrap_or(Category::SolarPanels),
            price_value: recommend::parse_price(&new_price),
            new_price,
            old_price: input.old_price.flatten(),
            stock: input.stock.unwrap_or(0),
            is_active: input.is_active.unwrap_or(true),
            is_featured: input.is_featured.unwrap_or(false),
            average_rating: 0.0,
            review_count: 0,
            specifications: input.specifications.unwrap_or_default(),
            images: StringList(images),
            tags: input.tags.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let product = self.storage.insert_product(product).await?;
        self.index.index_product(&product).await?;
        info!(id = %product.id, title = %product.title, "product created");
        self.notify(ActivityEvent::ProductCreated(product.clone()));
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<product::Model> {
        self.storage
            .get_product(id)
            .await?
            .ok_or(AppError::NotFound("Product"))
    }

    pub async fn list_products(&self, query: &ProductQuery) -> AppResult<Page<product::Model>> {
        Ok(self.storage.list_products(query).await?)
    }

    pub async fn featured_products(&self, limit: u64) -> AppResult<Vec<product::Model>> {
        let query = ProductQuery {
            featured: Some(true),
            active: Some(true),
            page: 1,
            limit: Some(limit),
            ..Default::default()
        };
        Ok(self.storage.list_products(&query).await?.items)
    }

    /// Applies the supplied fields. `averageRating` and `reviewCount` are never
    /// read from the form. New images replace the stored ones unless
    /// `keepImages` is true, in which case they are appended.
    pub async fn update_product(
        &self,
        id: Uuid,
        fields: FormFields,
        files: Vec<UploadedFile>,
    ) -> AppResult<product::Model> {
        let mut product = self.get_product(id).await?;
        let input = ProductInput::parse(&fields, false)?;
        let keep_images = fields.bool("keepImages")?.unwrap_or(false);

        if let Some(title) = input.title {
            product.title = title;
        }
        if let Some(description) = input.description {
            product.description = description;
        }
        if let Some(category) = input.category {
            product.category = category;
        }
        if let Some(new_price) = input.new_price {
            product.price_value = recommend::parse_price(&new_price);
            product.new_price = new_price;
        }
        if let Some(old_price) = input.old_price {
            product.old_price = old_price;
        }
        if let Some(stock) = input.stock {
            product.stock = stock;
        }
        if let Some(is_active) = input.is_active {
            product.is_active = is_active;
        }
        if let Some(is_featured) = input.is_featured {
            product.is_featured = is_featured;
        }
        if let Some(specifications) = input.specifications {
            product.specifications = specifications;
        }
        if let Some(tags) = input.tags {
            product.tags = tags;
        }

        let mut replaced = Vec::new();
        let uploaded = self.store_images(&files).await?;
        if !uploaded.is_empty() {
            if keep_images {
                product.images.0.extend(uploaded);
            } else {
                replaced = std::mem::replace(&mut product.images.0, uploaded);
            }
        }
        product.updated_at = Utc::now();

        let product = self
            .storage
            .update_product(product)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        for url in &replaced {
            self.uploads.remove(url).await;
        }

        self.index.index_product(&product).await?;
        debug!(id = %product.id, "product updated");
        self.notify(ActivityEvent::ProductUpdated(product.clone()));
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        let product = self.get_product(id).await?;

        let removed_reviews = self.storage.delete_reviews_for_product(id).await?;
        if !self.storage.delete_product(id).await? {
            return Err(AppError::NotFound("Product"));
        }
        self.index.remove_product(id).await?;
        for url in &product.images.0 {
            self.uploads.remove(url).await;
        }

        info!(%id, removed_reviews, "product deleted");
        self.notify(ActivityEvent::ProductDeleted { id });
        Ok(())
    }

    /// Up to four same-category suggestions for the product page.
    pub async fn related_products(&self, id: Uuid) -> AppResult<Vec<product::Model>> {
        let current = self.get_product(id).await?;

        let peers = self
            .storage
            .list_products(&ProductQuery {
                category: Some(current.category),
                active: Some(true),
                in_stock: true,
                sort: ProductSort::Oldest,
                ..Default::default()
            })
            .await?
            .items;

        let peers = recommend::same_category_peers(&current, peers);
        if !peers.is_empty() {
            return Ok(recommend::rank(&current, peers));
        }

        let featured = self
            .storage
            .list_products(&ProductQuery {
                featured: Some(true),
                active: Some(true),
                sort: ProductSort::Oldest,
                ..Default::default()
            })
            .await?
            .items;
        Ok(recommend::rank(
            &current,
            recommend::featured_fallback(&current, featured),
        ))
    }

    /// Full-text search over active products.
    pub async fn search_products(&self, query: &str) -> AppResult<Vec<product::Model>> {
        let hits = self.index.search(query, SEARCH_LIMIT).await?;
        let mut products = Vec::with_capacity(hits.len());
        for (id, _score) in hits {
            if let Some(product) = self.storage.get_product(id).await? {
                if product.is_active {
                    products.push(product);
                }
            }
        }
        Ok(products)
    }

    /// Public review submission. Reviews start unapproved.
    pub async fn submit_review(
        &self,
        product_id: Uuid,
        fields: FormFields,
    ) -> AppResult<review::Model> {
        self.add_review(product_id, &fields, false).await
    }

    /// Admin import of an existing review. Approved unless `isApproved` is false.
    pub async fn import_review(
        &self,
        product_id: Uuid,
        fields: FormFields,
    ) -> AppResult<review::Model> {
        let approved = fields.bool("isApproved")?.unwrap_or(true);
        self.add_review(product_id, &fields, approved).await
    }

    async fn add_review(
        &self,
        product_id: Uuid,
        fields: &FormFields,
        approved: bool,
    ) -> AppResult<review::Model> {
        let product = self.get_product(product_id).await?;
        let input = ReviewInput::parse(fields)?;

        let now = Utc::now();
        let review = review::Model {
            id: Uuid::new_v4(),
            product_id: product.id,
            customer_name: input.customer_name,
            customer_email: input.customer_email,
            rating: input.rating,
            title: input.title,
            comment: input.comment,
            is_approved: approved,
            created_at: now,
            updated_at: now,
        };

        let review = self.storage.insert_review(review).await?;
        info!(id = %review.id, product = %product_id, approved, "review added");
        self.notify(ActivityEvent::ReviewSubmitted(review.clone()));

        if review.is_approved {
            self.recompute_rating(product_id).await?;
        }
        Ok(review)
    }

    /// Approved reviews of one product, newest first.
    pub async fn product_reviews(
        &self,
        product_id: Uuid,
        page: u64,
        limit: Option<u64>,
    ) -> AppResult<Page<review::Model>> {
        self.get_product(product_id).await?;
        let query = ReviewQuery {
            product_id: Some(product_id),
            approved: Some(true),
            page,
            limit,
        };
        Ok(self.storage.list_reviews(&query).await?)
    }

    pub async fn list_reviews(&self, query: &ReviewQuery) -> AppResult<Page<review::Model>> {
        Ok(self.storage.list_reviews(query).await?)
    }

    /// Flips approval and recomputes the product's rating either way.
    pub async fn set_review_status(&self, id: Uuid, approved: bool) -> AppResult<review::Model> {
        let review = self
            .storage
            .set_review_approval(id, approved)
            .await?
            .ok_or(AppError::NotFound("Review"))?;

        info!(%id, approved, "review moderated");
        self.notify(ActivityEvent::ReviewModerated(review.clone()));
        self.recompute_rating(review.product_id).await?;
        Ok(review)
    }

    pub async fn delete_review(&self, id: Uuid) -> AppResult<review::Model> {
        let review = self
            .storage
            .delete_review(id)
            .await?
            .ok_or(AppError::NotFound("Review"))?;

        info!(%id, product = %review.product_id, "review deleted");
        self.notify(ActivityEvent::ReviewDeleted {
            id,
            product_id: review.product_id,
        });
        self.recompute_rating(review.product_id).await?;
        Ok(review)
    }

    /// Rewrites `averageRating`/`reviewCount` from the approved reviews.
    /// Returns `None` when the product no longer exists.
    pub async fn recompute_rating(&self, product_id: Uuid) -> AppResult<Option<RatingSummary>> {
        let totals: RatingTotals = self.storage.approved_rating_totals(product_id).await?;
        let summary = RatingSummary::from_totals(totals);

        if !self.storage.set_rating(product_id, summary).await? {
            debug!(%product_id, "rating recompute skipped, product is gone");
            return Ok(None);
        }

        debug!(
            %product_id,
            average = summary.average_rating,
            count = summary.review_count,
            "rating recomputed"
        );
        self.notify(ActivityEvent::RatingRecomputed {
            product_id,
            average_rating: summary.average_rating,
            review_count: summary.review_count,
        });
        Ok(Some(summary))
    }

    async fn store_images(&self, files: &[UploadedFile]) -> AppResult<Vec<String>> {
        let mut urls: Vec<String> = Vec::with_capacity(files.len());
        for file in files {
            if !matches!(file.field, UploadField::Images | UploadField::Image) {
                for url in &urls {
                    self.uploads.remove(url).await;
                }
                return Err(AppError::bad_request(format!(
                    "Unexpected file field: {}",
                    file.field.name()
                )));
            }
            match self.uploads.save(PRODUCT_UPLOAD_DIR, file).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    warn!(error = %e, "product image rejected");
                    for url in &urls {
                        self.uploads.remove(url).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(urls)
    }
}

/// Product fields read from a form. `None` means "not supplied".
#[derive(Debug, Default)]
struct ProductInput {
    title: Option<String>,
    description: Option<String>,
    category: Option<Category>,
    new_price: Option<String>,
    old_price: Option<Option<String>>,
    stock: Option<i32>,
    is_active: Option<bool>,
    is_featured: Option<bool>,
    specifications: Option<Specifications>,
    tags: Option<StringList>,
}

impl ProductInput {
    fn parse(fields: &FormFields, creating: bool) -> AppResult<Self> {
        let mut errors = Vec::new();
        let mut input = ProductInput {
            title: fields.text("title"),
            description: fields.text("description"),
            new_price: fields.text("newPrice"),
            ..Default::default()
        };

        if fields.contains("oldPrice") {
            input.old_price = Some(fields.text("oldPrice"));
        }

        if creating {
            if input.title.is_none() {
                errors.push(FieldError::new("title", "Title is required"));
            }
            if input.new_price.is_none() {
                errors.push(FieldError::new("newPrice", "Price is required"));
            }
            if fields.text("category").is_none() {
                errors.push(FieldError::new("category", "Category is required"));
            }
        } else {
            for (key, label) in [("title", "Title"), ("newPrice", "Price")] {
                if fields.contains(key) && fields.text(key).is_none() {
                    errors.push(FieldError::new(key, format!("{label} cannot be empty")));
                }
            }
        }

        if let Some(raw) = fields.text("category") {
            match Category::from_label(&raw) {
                Some(category) => input.category = Some(category),
                None => errors.push(FieldError::new(
                    "category",
                    format!(
                        "Category must be one of: {}",
                        Category::ALL.map(Category::label).join(", ")
                    ),
                )),
            }
        }

        collect(&mut errors, fields.int("stock"), |stock| match stock {
            Some(s) if s < 0 || s > i32::MAX as i64 => {
                Err(FieldError::new("stock", "Stock cannot be negative"))
            }
            other => {
                input.stock = other.map(|s| s as i32);
                Ok(())
            }
        });
        collect(&mut errors, fields.bool("isActive"), |v| {
            input.is_active = v;
            Ok(())
        });
        collect(&mut errors, fields.bool("isFeatured"), |v| {
            input.is_featured = v;
            Ok(())
        });
        collect(
            &mut errors,
            fields.json::<BTreeMap<String, serde_json::Value>>("specifications"),
            |specs| {
                input.specifications = specs.map(|specs| {
                    Specifications(
                        specs
                            .into_iter()
                            .map(|(k, v)| match v {
                                serde_json::Value::String(s) => (k, s),
                                other => (k, other.to_string()),
                            })
                            .collect(),
                    )
                });
                Ok(())
            },
        );
        collect(&mut errors, parse_tags(fields), |tags| {
            input.tags = tags;
            Ok(())
        });

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Tags arrive either JSON-encoded or comma separated.
fn parse_tags(fields: &FormFields) -> AppResult<Option<StringList>> {
    let tags = match fields.get("tags") {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(raw)) if !raw.trim_start().starts_with('[') => raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(_) => fields.json::<Vec<String>>("tags")?.unwrap_or_default(),
    };
    Ok(Some(StringList(tags)))
}

/// Folds a field reader's result into the running error list.
fn collect<T>(
    errors: &mut Vec<FieldError>,
    result: AppResult<T>,
    apply: impl FnOnce(T) -> Result<(), FieldError>,
) {
    match result {
        Ok(value) => {
            if let Err(e) = apply(value) {
                errors.push(e);
            }
        }
        Err(AppError::Validation(mut field_errors)) => errors.append(&mut field_errors),
        Err(other) => errors.push(FieldError::new("form", other.to_string())),
    }
}

#[derive(Debug)]
struct ReviewInput {
    customer_name: String,
    customer_email: String,
    rating: i32,
    title: Option<String>,
    comment: String,
}

impl ReviewInput {
    fn parse(fields: &FormFields) -> AppResult<Self> {
        let mut errors = Vec::new();
        let customer_name = fields.require_text("customerName", "Name", &mut errors);
        let customer_email = fields
            .require_text("customerEmail", "Email", &mut errors)
            .to_lowercase();
        let comment = fields.require_text("comment", "Comment", &mut errors);

        if !customer_email.is_empty() && !is_plausible_email(&customer_email) {
            errors.push(FieldError::new("customerEmail", "Email is not valid"));
        }

        let mut rating = 0;
        collect(&mut errors, fields.int("rating"), |value| match value {
            Some(r @ 1..=5) => {
                rating = r as i32;
                Ok(())
            }
            Some(_) => Err(FieldError::new("rating", "Rating must be between 1 and 5")),
            None => Err(FieldError::new("rating", "Rating is required")),
        });

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        Ok(Self {
            customer_name,
            customer_email,
            rating,
            title: fields.text("title"),
            comment,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MemoryIndex;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::StorageError;
    use anyhow::Result;
    use axum::body::Bytes;
    use futures::StreamExt;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};
    use tokio_stream::wrappers::BroadcastStream;

    fn form(value: serde_json::Value) -> FormFields {
        match value {
            serde_json::Value::Object(map) => FormFields::new(map),
            _ => unreachable!(),
        }
    }

    fn catalog() -> (Catalog, TempDir, broadcast::Sender<ActivityEvent>) {
        let dir = tempdir().unwrap();
        let (tx, _) = broadcast::channel(100);
        let catalog = Catalog::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryIndex::new()),
            UploadStore::new(dir.path(), "http://localhost:5000"),
            tx.clone(),
        );
        (catalog, dir, tx)
    }

    async fn panel(catalog: &Catalog, title: &str, price: &str) -> Result<product::Model> {
        Ok(catalog
            .create_product(
                form(json!({
                    "title": title,
                    "category": "Solar Panels",
                    "newPrice": price,
                    "stock": "20",
                })),
                Vec::new(),
            )
            .await?)
    }

    async fn review(catalog: &Catalog, product_id: Uuid, email: &str, rating: i32) -> Result<review::Model> {
        Ok(catalog
            .submit_review(
                product_id,
                form(json!({
                    "customerName": "Asha",
                    "customerEmail": email,
                    "rating": rating,
                    "comment": "Works well",
                })),
            )
            .await?)
    }

    #[tokio::test]
    async fn test_rating_scenario() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let product = panel(&catalog, "Mono 540W", "₹12,500").await?;

        let mut ids = Vec::new();
        for (i, rating) in [5, 5, 4, 3].into_iter().enumerate() {
            let r = review(&catalog, product.id, &format!("buyer{i}@example.com"), rating).await?;
            catalog.set_review_status(r.id, true).await?;
            ids.push(r.id);
        }
        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.average_rating, 4.3);
        assert_eq!(stored.review_count, 4);

        let low = review(&catalog, product.id, "grumpy@example.com", 1).await?;
        catalog.set_review_status(low.id, true).await?;
        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.average_rating, 3.6);
        assert_eq!(stored.review_count, 5);

        catalog.delete_review(low.id).await?;
        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.average_rating, 4.3);
        assert_eq!(stored.review_count, 4);

        for id in ids {
            catalog.delete_review(id).await?;
        }
        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.average_rating, 0.0);
        assert_eq!(stored.review_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unapproved_reviews_do_not_count() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let product = panel(&catalog, "Poly 330W", "9000").await?;

        let approved = review(&catalog, product.id, "a@example.com", 5).await?;
        catalog.set_review_status(approved.id, true).await?;
        review(&catalog, product.id, "b@example.com", 1).await?;

        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.average_rating, 5.0);
        assert_eq!(stored.review_count, 1);

        // Unapproving removes it from the aggregate.
        catalog.set_review_status(approved.id, false).await?;
        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.review_count, 0);

        let public = catalog.product_reviews(product.id, 1, None).await?;
        assert!(public.items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_submission_does_not_recompute() -> Result<()> {
        let (catalog, _dir, tx) = catalog();
        let product = panel(&catalog, "Mono", "100").await?;
        let mut events = BroadcastStream::new(tx.subscribe());

        review(&catalog, product.id, "a@example.com", 4).await?;
        drop(tx);
        drop(catalog);

        let mut seen = Vec::new();
        while let Some(Ok(event)) = events.next().await {
            seen.push(event);
        }
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], ActivityEvent::ReviewSubmitted(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_one_review_per_email() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let product = panel(&catalog, "Mono", "100").await?;

        review(&catalog, product.id, "Same@Example.com", 4).await?;
        let second = catalog
            .submit_review(
                product.id,
                form(json!({
                    "customerName": "Asha",
                    "customerEmail": "same@example.com ",
                    "rating": "5",
                    "comment": "Again",
                })),
            )
            .await;
        assert!(matches!(
            second,
            Err(AppError::Storage(StorageError::Duplicate(_)))
        ));

        let other = panel(&catalog, "Poly", "100").await?;
        review(&catalog, other.id, "same@example.com", 4).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_review_validation() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let product = panel(&catalog, "Mono", "100").await?;

        let result = catalog
            .submit_review(
                product.id,
                form(json!({ "customerEmail": "nope", "rating": 7 })),
            )
            .await;
        match result {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"customerName"));
                assert!(fields.contains(&"comment"));
                assert!(fields.contains(&"customerEmail"));
                assert!(fields.contains(&"rating"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let missing = catalog
            .submit_review(Uuid::new_v4(), form(json!({})))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound("Product"))));
        Ok(())
    }

    #[tokio::test]
    async fn test_recompute_for_missing_product_is_noop() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        assert_eq!(catalog.recompute_rating(Uuid::new_v4()).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_product_validation_and_derived_fields() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();

        let result = catalog
            .create_product(
                form(json!({ "category": "Wind", "stock": "-3" })),
                Vec::new(),
            )
            .await;
        match result {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("unexpected {other:?}"),
        }

        let product = catalog
            .create_product(
                form(json!({
                    "title": "Hybrid Inverter 5kW",
                    "category": "Inverters",
                    "newPrice": "₹45,000",
                    "oldPrice": "₹52,000",
                    "specifications": "{\"Capacity\":\"5kW\",\"Phases\":1}",
                    "tags": "Best Seller, New",
                    "averageRating": 5,
                    "reviewCount": 99,
                })),
                Vec::new(),
            )
            .await?;
        assert_eq!(product.price_value, 45000.0);
        assert_eq!(product.specifications.0["Phases"], "1");
        assert_eq!(product.tags.0, vec!["Best Seller", "New"]);
        assert_eq!(product.average_rating, 0.0);
        assert_eq!(product.review_count, 0);

        let updated = catalog
            .update_product(
                product.id,
                form(json!({ "newPrice": "40000", "averageRating": 5, "isFeatured": "true" })),
                Vec::new(),
            )
            .await?;
        assert_eq!(updated.price_value, 40000.0);
        assert!(updated.is_featured);
        assert_eq!(updated.average_rating, 0.0);
        assert_eq!(updated.old_price.as_deref(), Some("₹52,000"));
        Ok(())
    }

    #[tokio::test]
    async fn test_images_are_stored_and_replaced() -> Result<()> {
        let (catalog, dir, _tx) = catalog();
        let image = |name: &str| UploadedFile {
            field: UploadField::Images,
            file_name: Some(name.to_string()),
            content_type: Some(mime::IMAGE_JPEG),
            bytes: Bytes::from_static(b"jpeg"),
        };

        let product = catalog
            .create_product(
                form(json!({ "title": "Clamp", "category": "Accessories", "newPrice": "50" })),
                vec![image("a.jpg"), image("b.jpg")],
            )
            .await?;
        assert_eq!(product.images.0.len(), 2);
        let first = dir.path().join(product.images.0[0].trim_start_matches("/uploads/"));
        assert!(first.exists());

        let updated = catalog
            .update_product(product.id, FormFields::default(), vec![image("c.jpg")])
            .await?;
        assert_eq!(updated.images.0.len(), 1);
        assert!(!first.exists(), "replaced image is removed from disk");

        catalog.delete_product(product.id).await?;
        let last = dir.path().join(updated.images.0[0].trim_start_matches("/uploads/"));
        assert!(!last.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_drops_reviews() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let product = panel(&catalog, "Mono", "100").await?;
        let r = review(&catalog, product.id, "a@example.com", 5).await?;

        catalog.delete_product(product.id).await?;
        assert!(matches!(
            catalog.get_product(product.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.set_review_status(r.id, true).await,
            Err(AppError::NotFound("Review"))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_related_products() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let current = panel(&catalog, "Current", "1000").await?;
        for i in 0..5 {
            panel(&catalog, &format!("Peer {i}"), "1000").await?;
        }
        let hidden = panel(&catalog, "Hidden", "1000").await?;
        catalog
            .update_product(hidden.id, form(json!({ "isActive": false })), Vec::new())
            .await?;

        let related = catalog.related_products(current.id).await?;
        assert_eq!(related.len(), 4);
        assert!(related.iter().all(|p| p.id != current.id && p.id != hidden.id));

        // A lone battery falls back to featured products of any category.
        let battery = catalog
            .create_product(
                form(json!({ "title": "Gel", "category": "Batteries", "newPrice": "300" })),
                Vec::new(),
            )
            .await?;
        assert!(catalog.related_products(battery.id).await?.is_empty());

        catalog
            .update_product(current.id, form(json!({ "isFeatured": true })), Vec::new())
            .await?;
        let related = catalog.related_products(battery.id).await?;
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, current.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_related_ties_keep_creation_order() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let current = panel(&catalog, "Current", "500").await?;
        for title in ["first", "second", "third"] {
            panel(&catalog, title, "500").await?;
        }

        let related = catalog.related_products(current.id).await?;
        let titles: Vec<&str> = related.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_imported_review_counts_immediately() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let product = panel(&catalog, "Mono", "100").await?;

        let imported = catalog
            .import_review(
                product.id,
                form(json!({
                    "customerName": "Asha",
                    "customerEmail": "asha@example.com",
                    "rating": 4,
                    "comment": "From the old shop",
                })),
            )
            .await?;
        assert!(imported.is_approved);
        let stored = catalog.get_product(product.id).await?;
        assert_eq!(stored.average_rating, 4.0);
        assert_eq!(stored.review_count, 1);

        let pending = catalog
            .import_review(
                product.id,
                form(json!({
                    "customerName": "Ravi",
                    "customerEmail": "ravi@example.com",
                    "rating": 1,
                    "comment": "Needs a look",
                    "isApproved": false,
                })),
            )
            .await?;
        assert!(!pending.is_approved);
        assert_eq!(catalog.get_product(product.id).await?.review_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_products() -> Result<()> {
        let (catalog, _dir, _tx) = catalog();
        let mono = panel(&catalog, "Mono Panel", "100").await?;
        let poly = panel(&catalog, "Poly Panel", "100").await?;
        catalog
            .update_product(poly.id, form(json!({ "isActive": "false" })), Vec::new())
            .await?;

        let results = catalog.search_products("panel").await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, mono.id);

        catalog.delete_product(mono.id).await?;
        assert!(catalog.search_products("panel").await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_email_plausibility() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("ab.co"));
    }
}
