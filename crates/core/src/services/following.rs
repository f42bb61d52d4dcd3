//! Follow graph service.

use yatube_common::{AppError, AppResult, IdGenerator};
use yatube_db::{
    entities::{follow, user},
    repositories::FollowRepository,
};
use chrono::Utc;
use sea_orm::Set;

/// Result of a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// A new edge was stored.
    Created,
    /// The edge already existed; nothing changed.
    AlreadyFollowing,
    /// Follower and author are the same user; nothing changed.
    SelfFollow,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository) -> Self {
        Self {
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow an author.
    ///
    /// Idempotent: following yourself or an author you already follow is a
    /// no-op, never an error.
    pub async fn follow(&self, follower_id: &str, author_id: &str) -> AppResult<FollowOutcome> {
        if follower_id == author_id {
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.follow_repo.is_following(follower_id, author_id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            author_id: Set(author_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        match self.follow_repo.create(model).await {
            Ok(_) => {
                tracing::info!(follower_id, author_id, "Follow created");
                Ok(FollowOutcome::Created)
            }
            Err(e) => {
                // a concurrent request may have won the unique index
                if self.follow_repo.is_following(follower_id, author_id).await? {
                    tracing::debug!(error = %e, follower_id, author_id, "Follow raced");
                    Ok(FollowOutcome::AlreadyFollowing)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Stop following an author.
    ///
    /// The edge must exist; a missing edge is reported as
    /// [`AppError::FollowNotFound`].
    pub async fn unfollow(&self, follower_id: &str, author_id: &str) -> AppResult<()> {
        if !self.follow_repo.delete_by_pair(follower_id, author_id).await? {
            return Err(AppError::FollowNotFound {
                follower: follower_id.to_string(),
                author: author_id.to_string(),
            });
        }

        tracing::info!(follower_id, author_id, "Follow removed");
        Ok(())
    }

    /// Check if a user follows an author.
    pub async fn is_following(&self, follower_id: &str, author_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(follower_id, author_id).await
    }

    /// IDs of every author a user follows. Feeds the follow page.
    pub async fn followed_author_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        self.follow_repo.find_author_ids(follower_id).await
    }

    /// Whether a profile page shows its owner as followed by the viewer.
    ///
    /// Always false for anonymous viewers and for the owner themselves.
    pub async fn following_flag(
        &self,
        viewer: Option<&user::Model>,
        owner: &user::Model,
    ) -> AppResult<bool> {
        match viewer {
            Some(viewer) if viewer.id != owner.id => {
                self.follow_repo.is_following(&viewer.id, &owner.id).await
            }
            _ => Ok(false),
        }
    }

    /// Number of users following an author.
    pub async fn follower_count(&self, author_id: &str) -> AppResult<u64> {
        self.follow_repo.count_followers(author_id).await
    }
}
