//! View models and askama templates.

#![allow(missing_docs)]

use askama::Template;
use yatube_core::{
    CommentView, FormErrors, Page, PostView, authorization::post_detail_path,
    authorization::profile_path,
};
use yatube_db::entities::{group, user};

/// Date format used on post cards and comments.
const DATE_FORMAT: &str = "%-d %B %Y";

/// What every page layout needs.
#[derive(Clone)]
pub struct Chrome {
    pub title: String,
    /// Username of the logged-in viewer.
    pub viewer: Option<String>,
}

impl Chrome {
    pub fn new(title: impl Into<String>, viewer: Option<&user::Model>) -> Self {
        Self {
            title: title.into(),
            viewer: viewer.map(|v| v.username.clone()),
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i32,
    pub text: String,
    pub author_username: String,
    pub author_name: String,
    pub profile_href: String,
    pub created: String,
    pub group_title: Option<String>,
    pub group_href: Option<String>,
    pub image_url: Option<String>,
    pub comment_count: u64,
    pub detail_href: String,
}

impl From<&PostView> for PostCard {
    fn from(view: &PostView) -> Self {
        Self {
            id: view.post.id,
            text: view.post.text.clone(),
            author_username: view.author.username.clone(),
            author_name: view.author.display_name(),
            profile_href: profile_path(&view.author.username),
            created: view.post.created_at.format(DATE_FORMAT).to_string(),
            group_title: view.group.as_ref().map(|g| g.title.clone()),
            group_href: view.group.as_ref().map(|g| group_path(&g.slug)),
            image_url: view.image_url.clone(),
            comment_count: view.comment_count,
            detail_href: post_detail_path(view.post.id),
        }
    }
}

/// Post cards of a feed page.
pub fn post_cards(page: &Page<PostView>) -> Vec<PostCard> {
    page.items.iter().map(PostCard::from).collect()
}

#[derive(Clone)]
pub struct CommentCard {
    pub author_username: String,
    pub profile_href: String,
    pub created: String,
    pub text: String,
}

impl From<&CommentView> for CommentCard {
    fn from(view: &CommentView) -> Self {
        Self {
            author_username: view.author.username.clone(),
            profile_href: profile_path(&view.author.username),
            created: view.comment.created_at.format(DATE_FORMAT).to_string(),
            text: view.comment.text.clone(),
        }
    }
}

/// Page navigation links.
#[derive(Clone)]
pub struct Paginator {
    pub number: u64,
    pub total_pages: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
    pub links: Vec<PageLink>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
    pub number: u64,
    pub current: bool,
}

impl Paginator {
    /// Whether navigation should be shown at all.
    pub const fn is_shown(&self) -> bool {
        self.total_pages > 1
    }
}

impl<T> From<&Page<T>> for Paginator {
    fn from(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            total_pages: page.total_pages,
            previous: page.has_previous().then(|| page.previous_page_number()),
            next: page.has_next().then(|| page.next_page_number()),
            links: page
                .page_numbers()
                .into_iter()
                .map(|number| PageLink {
                    number,
                    current: number == page.number,
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

impl GroupOption {
    pub fn list(groups: &[group::Model], selected: Option<&str>) -> Vec<Self> {
        groups
            .iter()
            .map(|g| Self {
                id: g.id.clone(),
                title: g.title.clone(),
                selected: selected == Some(g.id.as_str()),
            })
            .collect()
    }
}

/// Path of a group's page.
pub fn group_path(slug: &str) -> String {
    format!("/group/{slug}/")
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub chrome: Chrome,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub chrome: Chrome,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub chrome: Chrome,
    pub group_title: String,
    pub group_description: String,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub chrome: Chrome,
    pub author_username: String,
    pub author_name: String,
    pub post_count: u64,
    pub follower_count: u64,
    pub following: bool,
    /// Viewer is logged in and is not the profile owner.
    pub can_follow: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub chrome: Chrome,
    pub post: PostCard,
    pub author_post_count: u64,
    pub can_edit: bool,
    pub edit_href: String,
    pub can_comment: bool,
    pub comment_action: String,
    pub comment_text: String,
    pub errors: FormErrors,
    pub comments: Vec<CommentCard>,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub chrome: Chrome,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub chrome: Chrome,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "users/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub chrome: Chrome,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "users/password_reset_form.html")]
pub struct PasswordResetTemplate {
    pub chrome: Chrome,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_done.html")]
pub struct PasswordResetDoneTemplate {
    pub chrome: Chrome,
}

/// New password form behind a reset link; `validlink` is false for a bad link.
#[derive(Template)]
#[template(path = "users/password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub chrome: Chrome,
    pub validlink: bool,
    pub action: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_complete.html")]
pub struct PasswordResetCompleteTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub chrome: Chrome,
    pub path: String,
}

#[derive(Template)]
#[template(path = "core/500.html")]
pub struct ServerErrorTemplate {
    pub chrome: Chrome,
}

/// Any other 4xx answer.
#[derive(Template)]
#[template(path = "core/error.html")]
pub struct ClientErrorTemplate {
    pub chrome: Chrome,
    pub status: u16,
    pub reason: String,
    pub message: String,
}
