//! Server-rendered web layer for yatube-rs.
//!
//! - **Pages**: feeds, post detail and forms, accounts, static pages
//! - **Middleware**: session resolution and the login guard
//! - **Cache**: interval-expiring cache for the front page
//!
//! Built on Axum 0.8 with askama templates.

pub mod cache;
pub mod extractors;
pub mod middleware;
pub mod pages;
pub mod response;
pub mod views;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::services::ServeDir;
use yatube_common::config::MediaConfig;

pub use cache::PageCache;
pub use middleware::AppState;

/// Assemble the application: pages, uploaded media and the 404 fallback.
pub fn app(state: AppState, media: &MediaConfig) -> Router {
    pages::router(state.page_cache.clone())
        .nest_service(&media.url, ServeDir::new(&media.root))
        .fallback(pages::posts::not_found)
        .layer(from_fn(response::error_pages))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware))
        .layer(DefaultBodyLimit::max(media.max_upload_bytes))
        .with_state(state)
}
