//! Comment service.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;
use yatube_common::AppResult;
use yatube_db::{
    entities::{comment, user},
    repositories::{CommentRepository, PostRepository, UserRepository},
};

use crate::forms::{FormErrors, Submission, not_blank};

/// Comment form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentInput {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub text: String,
}

/// A comment with its author.
#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: comment::Model,
    pub author: user::Model,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            user_repo,
        }
    }

    /// Add a comment under a post.
    ///
    /// Fails with `PostNotFound` when the post does not exist, before the
    /// form is looked at.
    pub async fn add(
        &self,
        author: &user::Model,
        post_id: i32,
        input: CommentInput,
    ) -> AppResult<Submission<comment::Model>> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if let Err(e) = input.validate() {
            return Ok(Submission::Rejected(FormErrors::from(&e)));
        }

        let model = comment::ActiveModel {
            post_id: Set(post.id),
            author_id: Set(author.id.clone()),
            text: Set(input.text),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let comment = self.comment_repo.create(model).await?;
        tracing::info!(comment_id = comment.id, post_id, author = %author.username, "Comment added");

        Ok(Submission::Accepted(comment))
    }

    /// Comments under a post with their authors, newest first.
    pub async fn for_post(&self, post_id: i32) -> AppResult<Vec<CommentView>> {
        let comments = self.comment_repo.find_by_post(post_id).await?;
        if comments.is_empty() {
            return Ok(vec![]);
        }

        let mut author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let author = authors.get(&comment.author_id)?.clone();
                Some(CommentView { comment, author })
            })
            .collect())
    }
}
