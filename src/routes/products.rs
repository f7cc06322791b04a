use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiPath, ApiQuery, ApiResponse, PageParams};
use crate::catalog::rating::RatingSummary;
use crate::entities::product::{self, Category};
use crate::error::{AppError, AppResult};
use crate::form::FormPayload;
use crate::state::AppState;
use crate::storage::{ProductQuery, ProductSort};

const FEATURED_LIMIT: u64 = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    page: Option<u64>,
    limit: Option<u64>,
    category: Option<String>,
    featured: Option<bool>,
    active: Option<bool>,
    in_stock: Option<bool>,
    search: Option<String>,
    sort: Option<ProductSort>,
}

impl ListParams {
    fn into_query(self) -> AppResult<ProductQuery> {
        let paging = PageParams {
            page: self.page,
            limit: self.limit,
        };
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(label) => Some(
                Category::from_label(label)
                    .ok_or_else(|| AppError::invalid("category", "Unknown category"))?,
            ),
        };

        Ok(ProductQuery {
            category,
            featured: self.featured,
            active: self.active,
            in_stock: self.in_stock.unwrap_or(false),
            search: self.search.filter(|term| !term.trim().is_empty()),
            sort: self.sort.unwrap_or_default(),
            page: paging.page(),
            limit: paging.limit(),
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<ApiResponse<Vec<product::Model>>>> {
    let query = params.into_query()?;
    Ok(ApiResponse::page(state.catalog.list_products(&query).await?))
}

#[derive(Debug, Deserialize)]
pub struct FeaturedParams {
    limit: Option<u64>,
}

pub async fn featured(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<FeaturedParams>,
) -> AppResult<Json<ApiResponse<Vec<product::Model>>>> {
    let limit = params.limit.unwrap_or(FEATURED_LIMIT).clamp(1, 50);
    Ok(ApiResponse::ok(state.catalog.featured_products(limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

pub async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> AppResult<Json<ApiResponse<Vec<product::Model>>>> {
    if params.q.trim().is_empty() {
        return Ok(ApiResponse::ok(Vec::new()));
    }
    Ok(ApiResponse::ok(
        state.catalog.search_products(&params.q).await?,
    ))
}

pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<product::Model>>> {
    Ok(ApiResponse::ok(state.catalog.get_product(id).await?))
}

pub async fn related(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<product::Model>>>> {
    Ok(ApiResponse::ok(state.catalog.related_products(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    form: FormPayload,
) -> AppResult<(StatusCode, Json<ApiResponse<product::Model>>)> {
    let product = state.catalog.create_product(form.fields, form.files).await?;
    Ok(ApiResponse::created(product, "Product created successfully"))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    form: FormPayload,
) -> AppResult<Json<ApiResponse<product::Model>>> {
    let product = state
        .catalog
        .update_product(id, form.fields, form.files)
        .await?;
    Ok(ApiResponse::with_message(
        product,
        "Product updated successfully",
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<Option<()>>>> {
    state.catalog.delete_product(id).await?;
    Ok(ApiResponse::with_message(
        None,
        "Product deleted successfully",
    ))
}

pub async fn recompute_rating(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<RatingSummary>>> {
    let summary = state
        .catalog
        .recompute_rating(id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::ok(summary))
}
