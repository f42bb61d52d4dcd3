//! Test utilities for database operations.
//!
//! Provides an in-memory SQLite database with migrations applied and
//! helpers for inserting fixture rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;

use crate::entities::{comment, follow, group, post, user};
use crate::migrations::Migrator;

/// Placeholder hash for fixture users; never verifies.
pub const UNUSABLE_PASSWORD: &str = "!";

/// A migrated in-memory database plus fixture helpers.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
    seq: std::sync::atomic::AtomicU32,
}

impl TestDatabase {
    /// Create a fresh in-memory database and run every migration.
    pub async fn new() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        // a second pooled connection would open a different, empty database
        opt.max_connections(1)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(3600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        Ok(Self {
            conn: Arc::new(conn),
            seq: std::sync::atomic::AtomicU32::new(0),
        })
    }

    /// Shared handle for repositories.
    #[must_use]
    pub fn conn(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{prefix}{n:06}")
    }

    /// Insert a user whose session token is `token-<username>`.
    pub async fn insert_user(&self, username: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(self.next_id("u")),
            username: Set(username.to_string()),
            username_lower: Set(username.to_lowercase()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            email: Set(format!("{username}@example.com")),
            password: Set(UNUSABLE_PASSWORD.to_string()),
            token: Set(Some(token_for(username))),
            reset_token: Set(None),
            reset_requested_at: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a group.
    pub async fn insert_group(&self, title: &str, slug: &str) -> Result<group::Model, DbErr> {
        group::ActiveModel {
            id: Set(self.next_id("g")),
            title: Set(title.to_string()),
            slug: Set(slug.to_string()),
            description: Set(format!("About {title}")),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a post created at the given instant.
    pub async fn insert_post_at(
        &self,
        author: &user::Model,
        group: Option<&group::Model>,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<post::Model, DbErr> {
        post::ActiveModel {
            text: Set(text.to_string()),
            author_id: Set(author.id.clone()),
            group_id: Set(group.map(|g| g.id.clone())),
            image: Set(None),
            created_at: Set(created_at.into()),
            ..Default::default()
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a post created now.
    pub async fn insert_post(
        &self,
        author: &user::Model,
        group: Option<&group::Model>,
        text: &str,
    ) -> Result<post::Model, DbErr> {
        self.insert_post_at(author, group, text, Utc::now()).await
    }

    /// Insert `count` posts one second apart, oldest first.
    ///
    /// Post `i` (zero based) is created at `base + offset + i` seconds.
    pub async fn insert_posts(
        &self,
        author: &user::Model,
        group: Option<&group::Model>,
        count: u32,
        offset_secs: i64,
    ) -> Result<Vec<post::Model>, DbErr> {
        let mut posts = Vec::with_capacity(count as usize);
        for i in 0..count {
            let at = fixture_epoch() + chrono::Duration::seconds(offset_secs + i64::from(i));
            let text = format!("{} post {}", author.username, i + 1);
            posts.push(self.insert_post_at(author, group, &text, at).await?);
        }
        Ok(posts)
    }

    /// Insert a comment.
    pub async fn insert_comment(
        &self,
        author: &user::Model,
        post: &post::Model,
        text: &str,
    ) -> Result<comment::Model, DbErr> {
        comment::ActiveModel {
            post_id: Set(post.id),
            author_id: Set(author.id.clone()),
            text: Set(text.to_string()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a follow edge.
    pub async fn insert_follow(
        &self,
        follower: &user::Model,
        author: &user::Model,
    ) -> Result<follow::Model, DbErr> {
        follow::ActiveModel {
            id: Set(self.next_id("f")),
            follower_id: Set(follower.id.clone()),
            author_id: Set(author.id.clone()),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.conn.as_ref())
        .await
    }
}

/// Session token given to fixture users.
#[must_use]
pub fn token_for(username: &str) -> String {
    format!("token-{username}")
}

/// Fixed instant fixture timestamps are measured from.
#[must_use]
pub fn fixture_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
