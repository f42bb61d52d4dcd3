//! Group service.

use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use validator::{Validate, ValidationError};
use yatube_common::{AppError, AppResult, IdGenerator};
use yatube_db::{entities::group, repositories::GroupRepository};

use crate::forms::not_blank;

/// Input for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupInput {
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub title: String,

    #[validate(custom(function = "valid_slug"), length(max = 50))]
    pub slug: String,

    #[serde(default)]
    pub description: String,
}

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    id_gen: IdGenerator,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository) -> Self {
        Self {
            group_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a group. The slug must be unused.
    pub async fn create(&self, input: CreateGroupInput) -> AppResult<group::Model> {
        input.validate()?;

        if self.group_repo.find_by_slug(&input.slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Group with slug '{}' already exists",
                input.slug
            )));
        }

        let model = group::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title.trim().to_string()),
            slug: Set(input.slug),
            description: Set(input.description),
            created_at: Set(Utc::now().into()),
        };

        let group = self.group_repo.create(model).await?;
        tracing::info!(group_id = %group.id, slug = %group.slug, "Group created");
        Ok(group)
    }

    /// Get a group by slug.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<group::Model> {
        self.group_repo.get_by_slug(slug).await
    }

    /// Every group, ordered by title.
    pub async fn list(&self) -> AppResult<Vec<group::Model>> {
        self.group_repo.find_all().await
    }

    /// Delete a group. Its posts stay, without a group.
    pub async fn delete_by_slug(&self, slug: &str) -> AppResult<group::Model> {
        let group = self.group_repo.get_by_slug(slug).await?;
        if !self.group_repo.delete(&group.id).await? {
            return Err(AppError::GroupNotFound(slug.to_string()));
        }

        tracing::info!(group_id = %group.id, slug = %group.slug, "Group deleted");
        Ok(group)
    }
}

/// ASCII letters, digits, hyphens and underscores; at least one.
fn valid_slug(value: &str) -> Result<(), ValidationError> {
    let well_formed = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !well_formed {
        let mut error = ValidationError::new("slug");
        error.message = Some(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".into(),
        );
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_group(id: &str, slug: &str) -> group::Model {
        group::Model {
            id: id.to_string(),
            title: format!("Group {slug}"),
            slug: slug.to_string(),
            description: String::new(),
            created_at: Utc::now().into(),
        }
    }

    fn input(title: &str, slug: &str) -> CreateGroupInput {
        CreateGroupInput {
            title: title.to_string(),
            slug: slug.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_valid_slug() {
        assert!(valid_slug("cats_and-dogs42").is_ok());
        assert!(valid_slug("").is_err());
        assert!(valid_slug("with space").is_err());
        assert!(valid_slug("кошки").is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input_without_queries() {
        let service = GroupService::new(GroupRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        )));

        assert!(matches!(
            service.create(input("  ", "cats")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.create(input("Cats", "cats!")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.create(input(&"t".repeat(201), "cats")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.create(input("Cats", &"s".repeat(51))).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_duplicate_slug_conflicts() {
        let existing = create_test_group("g1", "cats");
        let service = GroupService::new(GroupRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        )));

        assert!(matches!(
            service.create(input("Cats", "cats")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_group() {
        let created = create_test_group("g1", "cats");
        let service = GroupService::new(GroupRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group::Model>::new()])
                .append_query_results([[created]])
                .into_connection(),
        )));

        let group = service.create(input("Cats", "cats")).await.unwrap();

        assert_eq!(group.slug, "cats");
    }

    #[tokio::test]
    async fn test_delete_by_slug() {
        let existing = create_test_group("g1", "cats");
        let service = GroupService::new(GroupRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        )));

        let deleted = service.delete_by_slug("cats").await.unwrap();

        assert_eq!(deleted.id, "g1");
    }

    #[tokio::test]
    async fn test_delete_unknown_slug() {
        let service = GroupService::new(GroupRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group::Model>::new()])
                .into_connection(),
        )));

        assert!(matches!(
            service.delete_by_slug("nope").await,
            Err(AppError::GroupNotFound(_))
        ));
    }
}
