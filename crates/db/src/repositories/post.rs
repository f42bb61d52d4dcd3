//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use yatube_common::{AppError, AppResult};

/// Which posts a feed query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    /// Every post.
    All,
    /// Posts of one group, by group ID.
    Group(String),
    /// Posts of one author, by user ID.
    Author(String),
    /// Posts of any of the given authors, by user ID.
    Authors(Vec<String>),
}

impl PostFilter {
    fn apply(&self, query: Select<Post>) -> Select<Post> {
        match self {
            Self::All => query,
            Self::Group(group_id) => query.filter(post::Column::GroupId.eq(group_id.as_str())),
            Self::Author(author_id) => query.filter(post::Column::AuthorId.eq(author_id.as_str())),
            Self::Authors(author_ids) => {
                query.filter(post::Column::AuthorId.is_in(author_ids.iter().cloned()))
            }
        }
    }
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Count the posts a filter covers.
    pub async fn count(&self, filter: &PostFilter) -> AppResult<u64> {
        filter
            .apply(Post::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch a window of posts in feed order: newest first, ID breaking ties.
    pub async fn find_window(
        &self,
        filter: &PostFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        filter
            .apply(Post::find())
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Storage keys of the images attached to the posts a filter covers.
    pub async fn find_image_keys(&self, filter: &PostFilter) -> AppResult<Vec<String>> {
        let keys: Vec<Option<String>> = filter
            .apply(Post::find())
            .filter(post::Column::Image.is_not_null())
            .select_only()
            .column(post::Column::Image)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(keys.into_iter().flatten().collect())
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post together with its comments.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete(&self, id: i32) -> AppResult<bool> {
        let result = Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_post(id: i32, author_id: &str, group_id: Option<&str>) -> post::Model {
        post::Model {
            id,
            text: format!("Post number {id}"),
            author_id: author_id.to_string(),
            group_id: group_id.map(ToString::to_string),
            image: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_by_id(42).await;

        assert!(matches!(result, Err(AppError::PostNotFound(id)) if id == "42"));
    }

    #[tokio::test]
    async fn test_find_window_returns_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_post(2, "u1", Some("g1")),
                    create_test_post(1, "u1", None),
                ]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let posts = repo
            .find_window(&PostFilter::Author("u1".to_string()), 10, 10)
            .await
            .unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, 2);
    }

    #[tokio::test]
    async fn test_find_window_empty_author_set() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let posts = repo
            .find_window(&PostFilter::Authors(vec![]), 0, 10)
            .await
            .unwrap();

        assert!(posts.is_empty());
    }

    #[test]
    fn test_excerpt_is_fifteen_chars() {
        let mut post = create_test_post(1, "u1", None);
        post.text = "123456789012345678901234567890".to_string();
        assert_eq!(post.to_string(), "123456789012345");
    }
}
