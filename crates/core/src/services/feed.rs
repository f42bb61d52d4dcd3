//! Feed assembly: paginated, newest-first post listings.

use std::collections::HashMap;
use std::num::IntErrorKind;
use std::sync::Arc;

use yatube_common::{AppResult, StorageBackend};
use yatube_db::{
    entities::{group, post, user},
    repositories::{CommentRepository, GroupRepository, PostFilter, PostRepository, UserRepository},
};

use crate::services::following::FollowingService;

/// Posts per page on every feed.
pub const PAGE_SIZE: u64 = 10;

/// Parse a raw `page` query value.
///
/// Missing, non-numeric and non-positive values all mean the first page.
/// Numbers too large for `u64` saturate, so they clamp to the last page.
#[must_use]
pub fn parse_page(raw: Option<&str>) -> u64 {
    let Some(value) = raw.map(str::trim) else {
        return 1;
    };
    match value.parse::<u64>() {
        Ok(0) => 1,
        Ok(n) => n,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(_) => 1,
    }
}

/// Number of pages needed for `total` items.
#[must_use]
pub const fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Where a requested page lands once clamped to the available range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number actually served.
    pub number: u64,
    /// Items across all pages.
    pub total_items: u64,
    /// Pages available; zero when there are no items.
    pub total_pages: u64,
    /// Items per page.
    pub page_size: u64,
}

impl PageWindow {
    /// Clamp `requested` into `1..=total_pages` (page 1 when there are no pages).
    #[must_use]
    pub const fn locate(requested: u64, total_items: u64, page_size: u64) -> Self {
        let total_pages = page_count(total_items, page_size);
        let number = if requested < 1 {
            1
        } else if total_pages > 0 && requested > total_pages {
            total_pages
        } else if total_pages == 0 {
            1
        } else {
            requested
        };
        Self {
            number,
            total_items,
            total_pages,
            page_size,
        }
    }

    /// Rows to skip before this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.number - 1) * self.page_size
    }

    /// Whether the window contains any rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_items == 0
    }
}

/// One page of a feed.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page, in feed order.
    pub items: Vec<T>,
    /// 1-based page number.
    pub number: u64,
    /// Items across all pages.
    pub total_items: u64,
    /// Pages available.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Page of `items` located by `window`.
    #[must_use]
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            total_items: window.total_items,
            total_pages: window.total_pages,
        }
    }

    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// Whether a next page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    /// Number of the previous page.
    #[must_use]
    pub const fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1)
    }

    /// Number of the next page.
    #[must_use]
    pub const fn next_page_number(&self) -> u64 {
        self.number + 1
    }

    /// Whether there is more than one page to navigate.
    #[must_use]
    pub const fn has_other_pages(&self) -> bool {
        self.total_pages > 1
    }

    /// Every page number, for rendering navigation.
    #[must_use]
    pub fn page_numbers(&self) -> Vec<u64> {
        (1..=self.total_pages).collect()
    }
}

/// A post with everything a listing needs.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: post::Model,
    pub author: user::Model,
    pub group: Option<group::Model>,
    pub image_url: Option<String>,
    pub comment_count: u64,
}

/// Which collection a feed covers.
#[derive(Debug, Clone)]
pub enum FeedSource {
    /// Every post.
    All,
    /// Posts in a group.
    Group(group::Model),
    /// Posts written by a user.
    Author(user::Model),
    /// Posts by every author the given user follows.
    FollowedBy(user::Model),
}

/// Loads authors, groups, image URLs and comment counts for a batch of posts.
#[derive(Clone)]
pub struct PostViewLoader {
    user_repo: UserRepository,
    group_repo: GroupRepository,
    comment_repo: CommentRepository,
    storage: Arc<dyn StorageBackend>,
}

impl PostViewLoader {
    /// Create a new loader.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        group_repo: GroupRepository,
        comment_repo: CommentRepository,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            user_repo,
            group_repo,
            comment_repo,
            storage,
        }
    }

    /// Build views for `posts`, preserving their order.
    ///
    /// A post whose author row vanished between queries is dropped.
    pub async fn load(&self, posts: Vec<post::Model>) -> AppResult<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(vec![]);
        }

        let mut author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let mut group_ids: Vec<String> = posts.iter().filter_map(|p| p.group_id.clone()).collect();
        group_ids.sort_unstable();
        group_ids.dedup();

        let post_ids: Vec<i32> = posts.iter().map(|p| p.id).collect();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let groups: HashMap<String, group::Model> = self
            .group_repo
            .find_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();
        let comment_counts = self.comment_repo.count_by_posts(&post_ids).await?;

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let author = authors.get(&post.author_id)?.clone();
                let group = post.group_id.as_ref().and_then(|id| groups.get(id)).cloned();
                let image_url = post.image.as_deref().map(|key| self.storage.public_url(key));
                let comment_count = comment_counts.get(&post.id).copied().unwrap_or(0);
                Some(PostView {
                    post,
                    author,
                    group,
                    image_url,
                    comment_count,
                })
            })
            .collect())
    }

    /// Build the view of a single post.
    pub async fn load_one(&self, post: post::Model) -> AppResult<Option<PostView>> {
        Ok(self.load(vec![post]).await?.into_iter().next())
    }
}

/// Feed service assembling paginated listings.
#[derive(Clone)]
pub struct FeedService {
    post_repo: PostRepository,
    following: FollowingService,
    loader: PostViewLoader,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        following: FollowingService,
        loader: PostViewLoader,
    ) -> Self {
        Self {
            post_repo,
            following,
            loader,
        }
    }

    /// Assemble page `requested` of `source`.
    ///
    /// Out-of-range pages are clamped; an empty collection yields an empty
    /// first page with zero pages in total.
    pub async fn feed(&self, source: &FeedSource, requested: u64) -> AppResult<Page<PostView>> {
        let filter = match source {
            FeedSource::All => PostFilter::All,
            FeedSource::Group(group) => PostFilter::Group(group.id.clone()),
            FeedSource::Author(author) => PostFilter::Author(author.id.clone()),
            FeedSource::FollowedBy(viewer) => {
                let author_ids = self.following.followed_author_ids(&viewer.id).await?;
                if author_ids.is_empty() {
                    return Ok(Page::new(
                        vec![],
                        PageWindow::locate(requested, 0, PAGE_SIZE),
                    ));
                }
                PostFilter::Authors(author_ids)
            }
        };

        let total = self.post_repo.count(&filter).await?;
        let window = PageWindow::locate(requested, total, PAGE_SIZE);
        let posts = if window.is_empty() {
            vec![]
        } else {
            self.post_repo
                .find_window(&filter, window.offset(), window.page_size)
                .await?
        };

        tracing::debug!(
            filter = ?filter,
            requested,
            served = window.number,
            total,
            "Assembled feed page"
        );

        let items = self.loader.load(posts).await?;
        Ok(Page::new(items, window))
    }
}
