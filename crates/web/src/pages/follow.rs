//! Follow feed and follow/unfollow actions.

use axum::extract::{Path, State};
use yatube_core::{FeedSource, FollowOutcome, authorization::profile_path};

use crate::extractors::{AuthUser, PageQuery};
use crate::middleware::AppState;
use crate::response::{PageResult, found, render};
use crate::views::{Chrome, FollowTemplate, Paginator, post_cards};

/// Posts of every author the viewer follows.
pub async fn follow_index(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: PageQuery,
) -> PageResult {
    let page = state
        .feed_service
        .feed(&FeedSource::FollowedBy(user.clone()), query.number())
        .await?;

    render(FollowTemplate {
        chrome: Chrome::new("Followed authors", Some(&user)),
        posts: post_cards(&page),
        paginator: Paginator::from(&page),
    })
}

/// Follow an author, then go back to their profile.
pub async fn profile_follow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> PageResult {
    let author = state.user_service.get_by_username(&username).await?;
    let outcome = state.following_service.follow(&user.id, &author.id).await?;
    if outcome != FollowOutcome::Created {
        tracing::debug!(?outcome, follower = %user.username, author = %author.username, "Follow was a no-op");
    }

    Ok(found(&profile_path(&author.username)))
}

/// Unfollow an author, then go back to their profile.
///
/// Unknown authors and authors the viewer does not follow are not found.
pub async fn profile_unfollow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> PageResult {
    let author = state.user_service.get_by_username(&username).await?;
    state
        .following_service
        .unfollow(&user.id, &author.id)
        .await?;

    Ok(found(&profile_path(&author.username)))
}
