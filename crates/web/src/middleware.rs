//! Application state, identity resolution and the login guard.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use sea_orm::DatabaseConnection;
use yatube_common::{Config, StorageBackend, config::SessionConfig};
use yatube_core::{
    CommentService, FeedService, FollowingService, GroupService, ImageService, Mailer,
    PasswordResetService, PostService, PostViewLoader, UserService,
    authorization::{Action, authorize},
};
use yatube_db::{
    entities::user,
    repositories::{
        CommentRepository, FollowRepository, GroupRepository, PostRepository, UserRepository,
    },
};

use crate::cache::PageCache;
use crate::response::found;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub group_service: GroupService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub feed_service: FeedService,
    pub following_service: FollowingService,
    pub password_reset_service: PasswordResetService,
    pub page_cache: PageCache,
    pub session: SessionConfig,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        storage: Arc<dyn StorageBackend>,
        mailer: Arc<dyn Mailer>,
        config: &Config,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let group_repo = GroupRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let follow_repo = FollowRepository::new(Arc::clone(&db));

        let loader = PostViewLoader::new(
            user_repo.clone(),
            group_repo.clone(),
            comment_repo.clone(),
            Arc::clone(&storage),
        );
        let following_service = FollowingService::new(follow_repo);
        let comment_service =
            CommentService::new(comment_repo, post_repo.clone(), user_repo.clone());
        let post_service = PostService::new(
            post_repo.clone(),
            group_repo.clone(),
            loader.clone(),
            comment_service.clone(),
            ImageService::new(storage),
        );

        Self {
            user_service: UserService::new(user_repo.clone()),
            group_service: GroupService::new(group_repo),
            post_service,
            comment_service,
            feed_service: FeedService::new(post_repo, following_service.clone(), loader),
            following_service,
            password_reset_service: PasswordResetService::new(user_repo, mailer, &config.server.url),
            page_cache: PageCache::new(config.cache.index_ttl(), config.cache.capacity),
            session: config.session.clone(),
        }
    }
}

/// Authentication middleware.
///
/// Resolves the session cookie, or failing that a bearer token, and stores
/// the user in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let cookie_token = CookieJar::from_headers(req.headers())
        .get(&state.session.cookie_name)
        .map(|cookie| cookie.value().to_string());

    let bearer_token = || {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
    };

    if let Some(token) = cookie_token.or_else(bearer_token) {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => tracing::debug!("Unknown session token"),
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }
    }

    next.run(req).await
}

/// Send anonymous callers to the login page, remembering where they were going.
pub async fn require_login(req: Request<Body>, next: Next) -> Response {
    let viewer = req.extensions().get::<user::Model>();
    let requested = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path(), |pq| pq.as_str());

    match authorize(viewer, Action::Protected).redirect_target(requested) {
        Some(target) => {
            tracing::debug!(path = requested, "Login required");
            found(&target)
        }
        None => next.run(req).await,
    }
}
