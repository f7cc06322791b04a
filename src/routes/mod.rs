pub mod cms;
pub mod events;
pub mod products;
pub mod reviews;

use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth;
use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::Page;
use crate::uploads::PUBLIC_PREFIX;

const DEFAULT_PAGE_SIZE: u64 = 12;
const MAX_PAGE_SIZE: u64 = 100;

/// `axum::Json` with rejections reported through [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: Option<u64>,
    pub total_pages: u64,
}

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
            pagination: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
            pagination: None,
        })
    }

    pub fn created(data: T, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::with_message(data, message))
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn page(page: Page<T>) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            pagination: Some(Pagination {
                total: page.total,
                page: page.page,
                limit: page.limit,
                total_pages: page.total_pages,
            }),
            data: page.items,
        })
    }
}

/// `page`/`limit` query parameters shared by listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> Option<u64> {
        Some(self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE))
    }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/products", get(products::list))
        .route("/api/products/featured", get(products::featured))
        .route("/api/products/search", get(products::search))
        .route("/api/products/:id", get(products::show))
        .route("/api/products/:id/related", get(products::related))
        .route(
            "/api/reviews/product/:product_id",
            get(reviews::for_product).post(reviews::submit),
        )
        .route("/api/cms/settings/:key", get(cms::show_setting))
        .route("/api/cms/:resource", get(cms::list))
        .route("/api/cms/:resource/:id", get(cms::show));

    let admin = Router::new()
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/products", post(products::create))
        .route(
            "/api/products/:id",
            put(products::update).delete(products::delete),
        )
        .route(
            "/api/products/:id/recompute-rating",
            post(products::recompute_rating),
        )
        .route("/api/reviews", get(reviews::list))
        .route(
            "/api/reviews/product/:product_id/import",
            post(reviews::import),
        )
        .route("/api/reviews/:id", delete(reviews::delete))
        .route("/api/reviews/:id/status", put(reviews::set_status))
        .route("/api/cms/settings/:key", put(cms::update_setting))
        .route("/api/cms/:resource", post(cms::create))
        .route("/api/cms/:resource/reorder", put(cms::reorder))
        .route("/api/cms/:resource/:id", put(cms::update).delete(cms::delete))
        .route("/api/cms/:resource/:id/move", put(cms::move_entry))
        .route("/api/uploads/:resource", post(cms::upload))
        .route("/api/admin/events", get(events::activity_feed))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    // Multipart framing and text fields ride on top of the file itself.
    let body_limit = state.config.max_upload_bytes() * 4 + 1024 * 1024;

    public
        .merge(admin)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.config.upload_dir()))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "production": state.config.production(),
        "timestamp": Utc::now(),
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Route")
}
