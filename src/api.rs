use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

use crate::{
    cache::{MenuStatus, Multithreaded, Snapshot, CRAWL_FAILED_MESSAGE},
    parse::MenuPage,
    scheduler::{Scheduler, SchedulerStatus},
};

const NO_MENU_MESSAGE: &str = "메뉴 데이터가 없습니다.";

#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: Arc<Multithreaded>,
    pub scheduler: Arc<Scheduler>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MenuResponse {
    Data { success: bool, data: MenuPage },
    Message { success: bool, message: String },
}

impl MenuResponse {
    fn new(snapshot: Option<&Snapshot>, missing: &str) -> Self {
        match snapshot.and_then(Snapshot::menu) {
            Some(menu) => Self::Data {
                success: true,
                data: menu.clone(),
            },
            None => Self::Message {
                success: false,
                message: missing.to_string(),
            },
        }
    }
}

/// The cached menu, without triggering any work.
pub async fn get_menu(State(state): State<AppState>) -> Json<MenuResponse> {
    let snapshot = state.cache.snapshot().await;
    Json(MenuResponse::new(snapshot.as_deref(), NO_MENU_MESSAGE))
}

/// The cached menu, loading or crawling it first if nothing is cached yet.
pub async fn menu(State(state): State<AppState>) -> Json<MenuResponse> {
    let cache = &state.cache;
    if cache.snapshot().await.is_none()
        && !cache.load_current_menu().await
        && cache.snapshot().await.is_none()
    {
        cache.perform_crawl().await;
    }
    let snapshot = cache.snapshot().await;
    Json(MenuResponse::new(snapshot.as_deref(), CRAWL_FAILED_MESSAGE))
}

pub async fn menu_status(State(state): State<AppState>) -> Json<MenuStatus> {
    Json(state.cache.status().await)
}

pub async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

pub async fn request_refresh(State(state): State<AppState>) -> (StatusCode, Json<MenuStatus>) {
    if !state.cache.maybe_refresh().await {
        log::info!("Refresh request did not crawl");
    }
    (StatusCode::CREATED, Json(state.cache.status().await))
}

pub fn router(state: AppState) -> Router {
    let compression_layer: CompressionLayer = CompressionLayer::new()
        .br(true)
        .deflate(true)
        .gzip(true)
        .zstd(true);
    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET]) // intentionally excludes request-refresh/PUT
        .allow_origin(Any);
    let no_store = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(
            "no-store, no-cache, must-revalidate, post-check=0, pre-check=0, max-age=0",
        ),
    );
    let pragma =
        SetResponseHeaderLayer::overriding(header::PRAGMA, HeaderValue::from_static("no-cache"));
    let expires =
        SetResponseHeaderLayer::overriding(header::EXPIRES, HeaderValue::from_static("-1"));

    Router::new()
        .route("/menu", get(menu))
        .route("/api/menu", get(get_menu))
        .route("/api/menu-status", get(menu_status))
        .route("/api/scheduler-status", get(scheduler_status))
        .route("/request-refresh", put(request_refresh))
        .with_state(state)
        .layer(cors_layer)
        .layer(no_store)
        .layer(pragma)
        .layer(expires)
        .layer(compression_layer)
}
