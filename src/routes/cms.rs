use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, PageParams};
use crate::cms::{CmsResource, Direction, MoveOutcome, SettingsKey};
use crate::entities::cms_entry;
use crate::error::{AppError, AppResult};
use crate::form::FormPayload;
use crate::state::AppState;
use crate::storage::{EntryQuery, EntrySort};

fn resource(slug: &str) -> AppResult<CmsResource> {
    CmsResource::from_slug(slug).ok_or(AppError::NotFound("Resource"))
}

fn settings_key(slug: &str) -> AppResult<SettingsKey> {
    SettingsKey::from_slug(slug).ok_or(AppError::NotFound("Settings"))
}

fn documents(entries: &[cms_entry::Model]) -> Vec<Value> {
    entries.iter().map(cms_entry::Model::to_document).collect()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: Option<u64>,
    limit: Option<u64>,
    sort: Option<EntrySort>,
    active: Option<bool>,
}

/// Without `limit` the whole collection is returned.
pub async fn list(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<ApiResponse<Vec<Value>>>> {
    let resource = resource(&slug)?;
    let paging = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let query = EntryQuery {
        active: params.active,
        sort: params.sort.unwrap_or_default(),
        page: paging.page(),
        limit: params.limit.and(paging.limit()),
    };
    let page = state.cms.list(resource, &query).await?;
    Ok(ApiResponse::page(page.map(|entry| entry.to_document())))
}

pub async fn show(
    State(state): State<AppState>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let entry = state.cms.get(resource(&slug)?, id).await?;
    Ok(ApiResponse::ok(entry.to_document()))
}

pub async fn create(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    form: FormPayload,
) -> AppResult<(StatusCode, Json<ApiResponse<Value>>)> {
    let resource = resource(&slug)?;
    let entry = state.cms.create(resource, form.fields, form.files).await?;
    Ok(ApiResponse::created(
        entry.to_document(),
        "Created successfully",
    ))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
    form: FormPayload,
) -> AppResult<Json<ApiResponse<Value>>> {
    let resource = resource(&slug)?;
    let entry = state
        .cms
        .update(resource, id, form.fields, form.files)
        .await?;
    Ok(ApiResponse::with_message(
        entry.to_document(),
        "Updated successfully",
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let entry = state.cms.delete(resource(&slug)?, id).await?;
    Ok(ApiResponse::with_message(
        entry.to_document(),
        "Deleted successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub struct MoveBody {
    direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    success: bool,
    moved: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<Value>>,
}

pub async fn move_entry(
    State(state): State<AppState>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
    ApiJson(body): ApiJson<MoveBody>,
) -> AppResult<Json<MoveResponse>> {
    let resource = resource(&slug)?;
    let response = match state.cms.move_entry(resource, id, body.direction).await? {
        MoveOutcome::Moved(entries) => MoveResponse {
            success: true,
            moved: true,
            message: "Order updated",
            data: Some(documents(&entries)),
        },
        MoveOutcome::AtBoundary => MoveResponse {
            success: true,
            moved: false,
            message: "Cannot move further",
            data: None,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    ids: Vec<Uuid>,
}

pub async fn reorder(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(body): ApiJson<ReorderBody>,
) -> AppResult<Json<ApiResponse<Vec<Value>>>> {
    let entries = state.cms.reorder(resource(&slug)?, &body.ids).await?;
    Ok(ApiResponse::with_message(
        documents(&entries),
        "Order updated",
    ))
}

pub async fn show_setting(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let setting = state.cms.setting(settings_key(&slug)?).await?;
    Ok(ApiResponse::ok(setting.to_document()))
}

pub async fn update_setting(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    form: FormPayload,
) -> AppResult<Json<ApiResponse<Value>>> {
    let key = settings_key(&slug)?;
    let setting = state
        .cms
        .update_setting(key, form.fields, form.files)
        .await?;
    Ok(ApiResponse::with_message(
        setting.to_document(),
        "Updated successfully",
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedUrl {
    url: String,
    absolute_url: String,
}

pub async fn upload(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    form: FormPayload,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadedUrl>>)> {
    let resource = resource(&slug)?;
    let mut files = form.files.into_iter();
    let (Some(file), None) = (files.next(), files.next()) else {
        return Err(AppError::bad_request("Exactly one file is required"));
    };

    let url = state.cms.upload(resource, &file).await?;
    let absolute_url = state.uploads.absolute_url(&url);
    Ok(ApiResponse::created(
        UploadedUrl { url, absolute_url },
        "File uploaded",
    ))
}
