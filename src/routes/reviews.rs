use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageParams};
use crate::entities::review;
use crate::error::AppResult;
use crate::form::FormPayload;
use crate::state::AppState;
use crate::storage::ReviewQuery;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    All,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: Option<u64>,
    limit: Option<u64>,
    status: Option<ReviewStatus>,
    product: Option<Uuid>,
}

pub async fn for_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> AppResult<Json<ApiResponse<Vec<review::Model>>>> {
    let page = state
        .catalog
        .product_reviews(product_id, params.page(), params.limit())
        .await?;
    Ok(ApiResponse::page(page))
}

pub async fn submit(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
    form: FormPayload,
) -> AppResult<(StatusCode, Json<ApiResponse<review::Model>>)> {
    let review = state.catalog.submit_review(product_id, form.fields).await?;
    Ok(ApiResponse::created(
        review,
        "Review submitted and awaiting approval",
    ))
}

pub async fn import(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
    form: FormPayload,
) -> AppResult<(StatusCode, Json<ApiResponse<review::Model>>)> {
    let review = state.catalog.import_review(product_id, form.fields).await?;
    Ok(ApiResponse::created(review, "Review imported"))
}

/// Moderation queue. Defaults to every review, newest first.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<ApiResponse<Vec<review::Model>>>> {
    let paging = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let query = ReviewQuery {
        product_id: params.product,
        approved: match params.status.unwrap_or(ReviewStatus::All) {
            ReviewStatus::Pending => Some(false),
            ReviewStatus::Approved => Some(true),
            ReviewStatus::All => None,
        },
        page: paging.page(),
        limit: paging.limit(),
    };
    Ok(ApiResponse::page(state.catalog.list_reviews(&query).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    is_approved: bool,
}

pub async fn set_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusBody>,
) -> AppResult<Json<ApiResponse<review::Model>>> {
    let review = state.catalog.set_review_status(id, body.is_approved).await?;
    let message = if review.is_approved {
        "Review approved"
    } else {
        "Review unapproved"
    };
    Ok(ApiResponse::with_message(review, message))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<review::Model>>> {
    let review = state.catalog.delete_review(id).await?;
    Ok(ApiResponse::with_message(review, "Review deleted"))
}
