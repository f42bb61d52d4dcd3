//! Post service: creation, editing and the detail page.

use chrono::Utc;
use sea_orm::{IntoActiveModel, Set};
use validator::Validate;
use yatube_common::{AppError, AppResult};
use yatube_db::{
    entities::{group, post, user},
    repositories::{GroupRepository, PostFilter, PostRepository},
};

use crate::forms::{FormErrors, Submission, not_blank};
use crate::services::comment::{CommentService, CommentView};
use crate::services::feed::{PostView, PostViewLoader};
use crate::services::media::{CheckedImage, INVALID_IMAGE, ImageService, ImageUpload};

/// Characters of the text used as the detail page title.
pub const DETAIL_TITLE_LEN: usize = 30;

const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";

/// Post creation and edit form.
#[derive(Debug, Clone, Default, Validate)]
pub struct PostInput {
    #[validate(custom(function = "not_blank"))]
    pub text: String,

    /// Group ID; `None` or empty for no group.
    pub group: Option<String>,

    /// Drop the current image when no new one is uploaded.
    pub clear_image: bool,
}

impl PostInput {
    /// Prefill the edit form from a stored post.
    #[must_use]
    pub fn from_post(post: &post::Model) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.clone(),
            clear_image: false,
        }
    }

    /// Selected group ID, if any.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.group
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Everything the detail page shows.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub view: PostView,
    pub comments: Vec<CommentView>,
    pub author_post_count: u64,
}

impl PostDetail {
    /// Page title: the start of the post text.
    #[must_use]
    pub fn title(&self) -> String {
        self.view.post.excerpt(DETAIL_TITLE_LEN)
    }
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    group_repo: GroupRepository,
    loader: PostViewLoader,
    comments: CommentService,
    images: ImageService,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        group_repo: GroupRepository,
        loader: PostViewLoader,
        comments: CommentService,
        images: ImageService,
    ) -> Self {
        Self {
            post_repo,
            group_repo,
            loader,
            comments,
            images,
        }
    }

    /// Check a form and decode its image.
    async fn check(
        &self,
        input: &PostInput,
        image: Option<&ImageUpload>,
    ) -> AppResult<(FormErrors, Option<CheckedImage>)> {
        let mut errors = FormErrors::new();
        if let Err(e) = input.validate() {
            errors.extend_from(&e);
        }

        if let Some(group_id) = input.group_id()
            && self.group_repo.find_by_id(group_id).await?.is_none()
        {
            errors.add("group", INVALID_GROUP);
        }

        let checked = match image.filter(|upload| !upload.is_empty()) {
            Some(upload) => {
                let checked = self.images.check(upload).await?;
                if checked.is_none() {
                    errors.add("image", INVALID_IMAGE);
                }
                checked
            }
            None => None,
        };

        Ok((errors, checked))
    }

    /// Publish a post.
    pub async fn create(
        &self,
        author: &user::Model,
        input: PostInput,
        image: Option<ImageUpload>,
    ) -> AppResult<Submission<post::Model>> {
        let (errors, checked) = self.check(&input, image.as_ref()).await?;
        if !errors.is_empty() {
            return Ok(Submission::Rejected(errors));
        }

        let image_key = match &checked {
            Some(checked) => Some(self.images.store(checked).await?),
            None => None,
        };

        let model = post::ActiveModel {
            text: Set(input.text.clone()),
            author_id: Set(author.id.clone()),
            group_id: Set(input.group_id().map(str::to_string)),
            image: Set(image_key),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let post = self.post_repo.create(model).await?;
        tracing::info!(post_id = post.id, author = %author.username, "Post created");

        Ok(Submission::Accepted(post))
    }

    /// Edit a post. Only its author may do this.
    ///
    /// The stored image is kept unless a new one is uploaded or
    /// `clear_image` is set; a replaced or cleared file is removed.
    pub async fn update(
        &self,
        editor: &user::Model,
        post: post::Model,
        input: PostInput,
        image: Option<ImageUpload>,
    ) -> AppResult<Submission<post::Model>> {
        if post.author_id != editor.id {
            return Err(AppError::Forbidden(format!(
                "{} is not the author of post {}",
                editor.username, post.id
            )));
        }

        let (errors, checked) = self.check(&input, image.as_ref()).await?;
        if !errors.is_empty() {
            return Ok(Submission::Rejected(errors));
        }

        let image_key = match &checked {
            Some(checked) => Some(self.images.store(checked).await?),
            None if input.clear_image => None,
            None => post.image.clone(),
        };

        let post_id = post.id;
        let previous_image = post.image.clone();
        let mut active = post.into_active_model();
        active.text = Set(input.text.clone());
        active.group_id = Set(input.group_id().map(str::to_string));
        active.image = Set(image_key);

        let post = self.post_repo.update(active).await?;
        tracing::info!(post_id, editor = %editor.username, "Post updated");

        if let Some(old) = previous_image
            && post.image.as_deref() != Some(old.as_str())
        {
            self.images.discard(&old).await;
        }

        Ok(Submission::Accepted(post))
    }

    /// Get a post by ID.
    pub async fn get(&self, id: i32) -> AppResult<post::Model> {
        self.post_repo.get_by_id(id).await
    }

    /// Assemble the detail page of a post.
    pub async fn detail(&self, id: i32) -> AppResult<PostDetail> {
        let post = self.post_repo.get_by_id(id).await?;
        let author_id = post.author_id.clone();

        let view = self
            .loader
            .load_one(post)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))?;
        let comments = self.comments.for_post(id).await?;
        let author_post_count = self.post_repo.count(&PostFilter::Author(author_id)).await?;

        Ok(PostDetail {
            view,
            comments,
            author_post_count,
        })
    }

    /// Public URL of a stored image.
    #[must_use]
    pub fn image_url(&self, key: &str) -> String {
        self.images.url(key)
    }

    /// Groups offered by the post form.
    pub async fn group_choices(&self) -> AppResult<Vec<group::Model>> {
        self.group_repo.find_all().await
    }

    /// Delete a post with its comments and image.
    pub async fn delete(&self, id: i32) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(id).await?;
        if !self.post_repo.delete(id).await? {
            return Err(AppError::PostNotFound(id.to_string()));
        }

        tracing::info!(post_id = id, "Post deleted");
        if let Some(key) = &post.image {
            self.images.discard(key).await;
        }
        Ok(post)
    }

    /// Image keys of every post by `author_id`, for cleanup before the
    /// author's rows cascade away.
    pub async fn image_keys_by_author(&self, author_id: &str) -> AppResult<Vec<String>> {
        self.post_repo
            .find_image_keys(&PostFilter::Author(author_id.to_string()))
            .await
    }

    /// Remove stored images left behind by deleted posts.
    pub async fn discard_images(&self, keys: &[String]) {
        for key in keys {
            self.images.discard(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media::tests::SMALL_GIF;
    use bytes::Bytes;
    use std::sync::Arc;
    use yatube_common::{IdGenerator, LocalStorage, StorageBackend};
    use yatube_db::repositories::{CommentRepository, UserRepository};
    use yatube_db::test_utils::TestDatabase;

    struct Fixture {
        db: TestDatabase,
        service: PostService,
        comments: CommentService,
        media_dir: std::path::PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.media_dir);
        }
    }

    async fn fixture() -> Fixture {
        let db = TestDatabase::new().await.unwrap();
        let media_dir = std::env::temp_dir().join(format!(
            "yatube-posts-{}",
            IdGenerator::new().generate()
        ));
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::new(media_dir.clone(), "/media".to_string()));

        let comments = CommentService::new(
            CommentRepository::new(db.conn()),
            PostRepository::new(db.conn()),
            UserRepository::new(db.conn()),
        );
        let loader = PostViewLoader::new(
            UserRepository::new(db.conn()),
            GroupRepository::new(db.conn()),
            CommentRepository::new(db.conn()),
            storage.clone(),
        );
        let service = PostService::new(
            PostRepository::new(db.conn()),
            GroupRepository::new(db.conn()),
            loader,
            comments.clone(),
            ImageService::new(storage),
        );

        Fixture {
            db,
            service,
            comments,
            media_dir,
        }
    }

    fn input(text: &str, group: Option<&group::Model>) -> PostInput {
        PostInput {
            text: text.to_string(),
            group: group.map(|g| g.id.clone()),
            clear_image: false,
        }
    }

    fn gif() -> ImageUpload {
        ImageUpload {
            filename: "small.gif".to_string(),
            data: Bytes::from_static(SMALL_GIF),
        }
    }

    #[test]
    fn test_group_id_ignores_blank_choice() {
        let mut form = PostInput::default();
        assert_eq!(form.group_id(), None);
        form.group = Some(String::new());
        assert_eq!(form.group_id(), None);
        form.group = Some("g1".to_string());
        assert_eq!(form.group_id(), Some("g1"));
    }

    #[tokio::test]
    async fn test_create_with_group_and_image() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let group = fx.db.insert_group("Cats", "cats").await.unwrap();

        let post = fx
            .service
            .create(&author, input("Cats are great", Some(&group)), Some(gif()))
            .await
            .unwrap()
            .accepted()
            .unwrap();

        assert_eq!(post.group_id.as_deref(), Some(group.id.as_str()));
        let key = post.image.clone().unwrap();
        assert!(key.starts_with("posts/"));
        assert!(fx.media_dir.join(&key).exists());

        let detail = fx.service.detail(post.id).await.unwrap();
        assert_eq!(detail.view.image_url, Some(format!("/media/{key}")));
        assert_eq!(detail.view.group.map(|g| g.slug), Some("cats".to_string()));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_form() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();

        let form = PostInput {
            text: "  ".to_string(),
            group: Some("missing".to_string()),
            clear_image: false,
        };
        let upload = ImageUpload {
            filename: "notes.txt".to_string(),
            data: Bytes::from_static(b"plain text"),
        };

        let Submission::Rejected(errors) =
            fx.service.create(&author, form, Some(upload)).await.unwrap()
        else {
            panic!("invalid post accepted");
        };

        assert!(errors.has("text"));
        assert_eq!(errors.get("group"), [INVALID_GROUP.to_string()]);
        assert!(errors.has("image"));
    }

    #[tokio::test]
    async fn test_update_by_author_keeps_image() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let post = fx
            .service
            .create(&author, input("Before", None), Some(gif()))
            .await
            .unwrap()
            .accepted()
            .unwrap();

        let updated = fx
            .service
            .update(&author, post.clone(), input("After", None), None)
            .await
            .unwrap()
            .accepted()
            .unwrap();

        assert_eq!(updated.id, post.id);
        assert_eq!(updated.text, "After");
        assert_eq!(updated.image, post.image);
        assert_eq!(updated.created_at, post.created_at);
        assert!(fx.media_dir.join(updated.image.unwrap()).exists());
    }

    #[tokio::test]
    async fn test_update_with_new_image_removes_old_file() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let post = fx
            .service
            .create(&author, input("Before", None), Some(gif()))
            .await
            .unwrap()
            .accepted()
            .unwrap();
        let old = post.image.clone().unwrap();

        let updated = fx
            .service
            .update(&author, post, input("After", None), Some(gif()))
            .await
            .unwrap()
            .accepted()
            .unwrap();

        let new = updated.image.unwrap();
        assert_ne!(new, old);
        assert!(fx.media_dir.join(&new).exists());
        assert!(!fx.media_dir.join(&old).exists());
    }

    #[tokio::test]
    async fn test_update_can_clear_image() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let post = fx
            .service
            .create(&author, input("Before", None), Some(gif()))
            .await
            .unwrap()
            .accepted()
            .unwrap();

        let old = post.image.clone().unwrap();

        let mut form = input("After", None);
        form.clear_image = true;
        let updated = fx
            .service
            .update(&author, post, form, None)
            .await
            .unwrap()
            .accepted()
            .unwrap();

        assert_eq!(updated.image, None);
        assert!(!fx.media_dir.join(old).exists());
    }

    #[tokio::test]
    async fn test_update_by_stranger_is_forbidden() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let stranger = fx.db.insert_user("anna").await.unwrap();
        let post = fx.db.insert_post(&author, None, "Mine").await.unwrap();

        let result = fx
            .service
            .update(&stranger, post.clone(), input("Yours now", None), None)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(fx.service.get(post.id).await.unwrap().text, "Mine");
    }

    #[tokio::test]
    async fn test_detail() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let reader = fx.db.insert_user("anna").await.unwrap();
        fx.db.insert_post(&author, None, "Older").await.unwrap();
        let post = fx
            .db
            .insert_post(&author, None, "A text that is clearly longer than thirty characters")
            .await
            .unwrap();
        fx.comments
            .add(
                &reader,
                post.id,
                crate::services::comment::CommentInput {
                    text: "Nice".to_string(),
                },
            )
            .await
            .unwrap();

        let detail = fx.service.detail(post.id).await.unwrap();

        assert_eq!(detail.title(), "A text that is clearly longer ");
        assert_eq!(detail.author_post_count, 2);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.view.comment_count, 1);
        assert_eq!(detail.view.author.username, "leo");
    }

    #[tokio::test]
    async fn test_delete_removes_comments() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let post = fx.db.insert_post(&author, None, "Doomed").await.unwrap();
        fx.db.insert_comment(&author, &post, "bye").await.unwrap();

        fx.service.delete(post.id).await.unwrap();

        assert!(matches!(
            fx.service.detail(post.id).await,
            Err(AppError::PostNotFound(_))
        ));
        assert!(fx.comments.for_post(post.id).await.unwrap().is_empty());
        assert!(matches!(
            fx.service.delete(post.id).await,
            Err(AppError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_image_file() {
        let fx = fixture().await;
        let author = fx.db.insert_user("leo").await.unwrap();
        let post = fx
            .service
            .create(&author, input("Pictured", None), Some(gif()))
            .await
            .unwrap()
            .accepted()
            .unwrap();
        let key = post.image.clone().unwrap();
        assert_eq!(
            fx.service.image_keys_by_author(&author.id).await.unwrap(),
            vec![key.clone()]
        );

        fx.service.delete(post.id).await.unwrap();

        assert!(!fx.media_dir.join(key).exists());
        assert!(fx.service.image_keys_by_author(&author.id).await.unwrap().is_empty());
    }
}
