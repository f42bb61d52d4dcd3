//! HTML pages and their routes.

#![allow(missing_docs)]

pub mod about;
pub mod auth;
pub mod follow;
pub mod posts;

use axum::{
    Router, middleware,
    routing::get,
};

use crate::cache::{PageCache, page_cache_layer};
use crate::middleware::{AppState, require_login};

/// The global feed, served through the page cache.
fn cached_routes(cache: PageCache) -> Router<AppState> {
    Router::new()
        .route("/", get(posts::index))
        .route_layer(middleware::from_fn_with_state(cache, page_cache_layer))
}

/// Routes that need a logged-in user.
fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow::follow_index))
        .route(
            "/profile/{username}/follow/",
            get(follow::profile_follow).post(follow::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(follow::profile_unfollow).post(follow::profile_unfollow),
        )
        .route(
            "/create/",
            get(posts::post_create_form).post(posts::post_create),
        )
        .route(
            "/posts/{post_id}/edit/",
            get(posts::post_edit_form).post(posts::post_edit),
        )
        .route(
            "/posts/{post_id}/comment/",
            get(posts::comment_form).post(posts::add_comment),
        )
        .route(
            "/auth/password_change/",
            get(auth::password_change_form).post(auth::password_change),
        )
        .route(
            "/auth/password_change/done/",
            get(auth::password_change_done),
        )
        .route_layer(middleware::from_fn(require_login))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/posts/{post_id}/", get(posts::post_detail))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route(
            "/auth/password_reset/",
            get(auth::password_reset_form).post(auth::password_reset),
        )
        .route("/auth/password_reset/done/", get(auth::password_reset_done))
        .route(
            "/auth/reset/{uid}/{token}/",
            get(auth::password_reset_confirm_form).post(auth::password_reset_confirm),
        )
        .route("/auth/reset/done/", get(auth::password_reset_complete))
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech))
}

/// Create the page router.
pub fn router(cache: PageCache) -> Router<AppState> {
    Router::new()
        .merge(cached_routes(cache))
        .merge(protected_routes())
        .merge(public_routes())
}
