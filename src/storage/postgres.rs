use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Index, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Schema, Select, SqlErr, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::catalog::rating::{RatingSummary, RatingTotals};
use crate::cms::CmsResource;
use crate::entities::{cms_entry, cms_setting, product, review};
use crate::storage::{
    CatalogStorage, CmsStorage, EntryQuery, EntrySort, Page, ProductQuery, ProductSort,
    ReviewQuery, StorageError, StorageResult, DUPLICATE_REVIEW,
};

pub struct PostgresStorage {
    db: DatabaseConnection,
}

impl PostgresStorage {
    pub async fn new(database_url: &str) -> StorageResult<Self> {
        let mut options = ConnectOptions::new(database_url.to_owned());
        options.max_connections(5).sqlx_logging(false);
        let db = Database::connect(options).await?;

        Self::init_database(&db).await?;
        info!("database schema ready");

        Ok(Self { db })
    }

    async fn init_database(db: &DatabaseConnection) -> Result<(), DbErr> {
        let schema = Schema::new(db.get_database_backend());

        create_table(db, &schema, product::Entity).await?;
        create_table(db, &schema, review::Entity).await?;
        create_table(db, &schema, cms_entry::Entity).await?;
        create_table(db, &schema, cms_setting::Entity).await?;

        let backend = db.get_database_backend();
        let indexes = [
            Index::create()
                .name("idx_reviews_product_email")
                .table(review::Entity)
                .col(review::Column::ProductId)
                .col(review::Column::CustomerEmail)
                .unique()
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_products_category")
                .table(product::Entity)
                .col(product::Column::Category)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_cms_entries_resource_position")
                .table(cms_entry::Entity)
                .col(cms_entry::Column::Resource)
                .col(cms_entry::Column::Position)
                .if_not_exists()
                .to_owned(),
        ];
        for index in &indexes {
            db.execute(backend.build(index)).await?;
        }

        Ok(())
    }
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let statement = schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned();
    db.execute(db.get_database_backend().build(&statement))
        .await?;
    Ok(())
}

async fn paginate<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    page: u64,
    limit: Option<u64>,
) -> Result<Page<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let page = page.max(1);
    match limit {
        Some(limit) => {
            let paginator = select.paginate(db, limit.max(1));
            let total = paginator.num_items().await?;
            let items = paginator.fetch_page(page - 1).await?;
            Ok(Page::new(items, total, page, Some(limit)))
        }
        None => {
            let items = select.all(db).await?;
            let total = items.len() as u64;
            Ok(Page::new(items, total, page, None))
        }
    }
}

fn product_select(query: &ProductQuery) -> Select<product::Entity> {
    let mut select = product::Entity::find();

    if let Some(category) = query.category {
        select = select.filter(product::Column::Category.eq(category));
    }
    if let Some(featured) = query.featured {
        select = select.filter(product::Column::IsFeatured.eq(featured));
    }
    if let Some(active) = query.active {
        select = select.filter(product::Column::IsActive.eq(active));
    }
    if query.in_stock {
        select = select.filter(product::Column::Stock.gt(0));
    }
    if let Some(term) = query.search.as_deref() {
        let pattern = format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"));
        select = select.filter(
            Expr::col(product::Column::Title)
                .ilike(pattern.clone())
                .or(Expr::col(product::Column::Description).ilike(pattern)),
        );
    }

    match query.sort {
        ProductSort::Newest => select.order_by_desc(product::Column::CreatedAt),
        ProductSort::PriceAsc => select.order_by_asc(product::Column::PriceValue),
        ProductSort::PriceDesc => select.order_by_desc(product::Column::PriceValue),
        ProductSort::Rating => select
            .order_by_desc(product::Column::AverageRating)
            .order_by_desc(product::Column::ReviewCount),
        ProductSort::Oldest => select
            .order_by_asc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Id),
    }
}

#[async_trait]
impl CatalogStorage for PostgresStorage {
    async fn insert_product(&self, product: product::Model) -> StorageResult<product::Model> {
        Ok(product
            .into_active_model()
            .reset_all()
            .insert(&self.db)
            .await?)
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<product::Model>> {
        Ok(product::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_products(&self, query: &ProductQuery) -> StorageResult<Page<product::Model>> {
        Ok(paginate(&self.db, product_select(query), query.page, query.limit).await?)
    }

    async fn update_product(
        &self,
        product: product::Model,
    ) -> StorageResult<Option<product::Model>> {
        // Rating columns belong to `set_rating` alone.
        let mut active = product.into_active_model().reset_all();
        active.average_rating = ActiveValue::NotSet;
        active.review_count = ActiveValue::NotSet;
        match active.update(&self.db).await {
            Ok(updated) => Ok(Some(updated)),
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_product(&self, id: Uuid) -> StorageResult<bool> {
        let result = product::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_rating(&self, id: Uuid, summary: RatingSummary) -> StorageResult<bool> {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::AverageRating,
                Expr::value(summary.average_rating),
            )
            .col_expr(
                product::Column::ReviewCount,
                Expr::value(summary.review_count as i32),
            )
            .filter(product::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_review(&self, review: review::Model) -> StorageResult<review::Model> {
        match review.into_active_model().reset_all().insert(&self.db).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StorageError::Duplicate(DUPLICATE_REVIEW))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_review(&self, id: Uuid) -> StorageResult<Option<review::Model>> {
        Ok(review::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> StorageResult<Page<review::Model>> {
        let mut select = review::Entity::find();
        if let Some(product_id) = query.product_id {
            select = select.filter(review::Column::ProductId.eq(product_id));
        }
        if let Some(approved) = query.approved {
            select = select.filter(review::Column::IsApproved.eq(approved));
        }
        let select = select.order_by_desc(review::Column::CreatedAt);
        Ok(paginate(&self.db, select, query.page, query.limit).await?)
    }

    async fn set_review_approval(
        &self,
        id: Uuid,
        approved: bool,
    ) -> StorageResult<Option<review::Model>> {
        let result = review::Entity::update_many()
            .col_expr(review::Column::IsApproved, Expr::value(approved))
            .col_expr(review::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(review::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get_review(id).await
    }

    async fn delete_review(&self, id: Uuid) -> StorageResult<Option<review::Model>> {
        let Some(existing) = self.get_review(id).await? else {
            return Ok(None);
        };
        let result = review::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok((result.rows_affected > 0).then_some(existing))
    }

    async fn delete_reviews_for_product(&self, product_id: Uuid) -> StorageResult<u64> {
        let result = review::Entity::delete_many()
            .filter(review::Column::ProductId.eq(product_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn approved_rating_totals(&self, product_id: Uuid) -> StorageResult<RatingTotals> {
        let row: Option<(i64, Option<i64>)> = review::Entity::find()
            .select_only()
            .column_as(Expr::col(review::Column::Id).count(), "count")
            .column_as(Expr::col(review::Column::Rating).sum(), "total")
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::IsApproved.eq(true))
            .into_tuple()
            .one(&self.db)
            .await?;

        let (count, sum) = row.unwrap_or_default();
        Ok(RatingTotals {
            count: count.max(0) as u64,
            sum: sum.unwrap_or(0).max(0) as u64,
        })
    }
}

#[async_trait]
impl CmsStorage for PostgresStorage {
    async fn insert_entry(&self, entry: cms_entry::Model) -> StorageResult<cms_entry::Model> {
        Ok(entry
            .into_active_model()
            .reset_all()
            .insert(&self.db)
            .await?)
    }

    async fn get_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
    ) -> StorageResult<Option<cms_entry::Model>> {
        Ok(cms_entry::Entity::find_by_id(id)
            .filter(cms_entry::Column::Resource.eq(resource))
            .one(&self.db)
            .await?)
    }

    async fn list_entries(
        &self,
        resource: CmsResource,
        query: &EntryQuery,
    ) -> StorageResult<Page<cms_entry::Model>> {
        let mut select =
            cms_entry::Entity::find().filter(cms_entry::Column::Resource.eq(resource));
        if let Some(active) = query.active {
            select = select.filter(cms_entry::Column::IsActive.eq(active));
        }
        let select = match query.sort {
            EntrySort::Order => select
                .order_by_asc(cms_entry::Column::Position)
                .order_by_asc(cms_entry::Column::CreatedAt),
            EntrySort::Newest => select.order_by_desc(cms_entry::Column::CreatedAt),
            EntrySort::Oldest => select.order_by_asc(cms_entry::Column::CreatedAt),
        };
        Ok(paginate(&self.db, select, query.page, query.limit).await?)
    }

    async fn update_entry(
        &self,
        entry: cms_entry::Model,
    ) -> StorageResult<Option<cms_entry::Model>> {
        if self.get_entry(entry.resource, entry.id).await?.is_none() {
            return Ok(None);
        }
        // Positions are only written by `write_positions`.
        let mut active = entry.into_active_model().reset_all();
        active.position = ActiveValue::NotSet;
        match active.update(&self.db).await {
            Ok(updated) => Ok(Some(updated)),
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
    ) -> StorageResult<Option<cms_entry::Model>> {
        let Some(existing) = self.get_entry(resource, id).await? else {
            return Ok(None);
        };
        let result = cms_entry::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok((result.rows_affected > 0).then_some(existing))
    }

    async fn next_position(&self, resource: CmsResource) -> StorageResult<i32> {
        let max: Option<Option<i32>> = cms_entry::Entity::find()
            .select_only()
            .column_as(Expr::col(cms_entry::Column::Position).max(), "max_position")
            .filter(cms_entry::Column::Resource.eq(resource))
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(max.flatten().map_or(0, |m| m + 1))
    }

    async fn write_positions(
        &self,
        resource: CmsResource,
        positions: &[(Uuid, i32)],
    ) -> StorageResult<()> {
        let txn = self.db.begin().await?;
        let now = Utc::now();
        for (id, position) in positions {
            cms_entry::Entity::update_many()
                .col_expr(cms_entry::Column::Position, Expr::value(*position))
                .col_expr(cms_entry::Column::UpdatedAt, Expr::value(now))
                .filter(cms_entry::Column::Id.eq(*id))
                .filter(cms_entry::Column::Resource.eq(resource))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StorageResult<Option<cms_setting::Model>> {
        Ok(cms_setting::Entity::find_by_id(key.to_owned())
            .one(&self.db)
            .await?)
    }

    async fn insert_setting_if_absent(
        &self,
        setting: cms_setting::Model,
    ) -> StorageResult<cms_setting::Model> {
        let key = setting.key.clone();
        cms_setting::Entity::insert(setting.into_active_model().reset_all())
            .on_conflict(
                OnConflict::column(cms_setting::Column::Key)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.get_setting(&key)
            .await?
            .ok_or_else(|| StorageError::Database(DbErr::RecordNotFound(key)))
    }

    async fn save_setting(&self, setting: cms_setting::Model) -> StorageResult<cms_setting::Model> {
        let key = setting.key.clone();
        cms_setting::Entity::insert(setting.into_active_model().reset_all())
            .on_conflict(
                OnConflict::column(cms_setting::Column::Key)
                    .update_columns([
                        cms_setting::Column::Data,
                        cms_setting::Column::Media,
                        cms_setting::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.get_setting(&key)
            .await?
            .ok_or_else(|| StorageError::Database(DbErr::RecordNotFound(key)))
    }
}
