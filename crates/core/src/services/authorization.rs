//! Access decisions for protected actions.
//!
//! Every decision is a pure function of the acting identity and the target;
//! the HTTP layer turns a denial into the matching redirect.

use yatube_db::entities::{post, user};

/// Path of the login page.
pub const LOGIN_PATH: &str = "/auth/login/";

/// An action that may need an identity.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    /// Anything behind the login wall: posting, commenting, following,
    /// the follow feed and password change.
    Protected,
    /// Open the edit form of a post or submit it.
    EditPost(&'a post::Model),
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The action may proceed.
    Granted,
    /// No identity; the caller must log in first.
    Unauthenticated,
    /// The identity is not the post's author.
    NotAuthor {
        /// Post the caller tried to edit.
        post_id: i32,
    },
}

impl Access {
    /// Whether the action may proceed.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Where a denied caller is sent, given the path they asked for.
    #[must_use]
    pub fn redirect_target(&self, requested: &str) -> Option<String> {
        match self {
            Self::Granted => None,
            Self::Unauthenticated => Some(login_url(requested)),
            Self::NotAuthor { post_id } => Some(post_detail_path(*post_id)),
        }
    }
}

/// Decide whether `viewer` may perform `action`.
#[must_use]
pub fn authorize(viewer: Option<&user::Model>, action: Action<'_>) -> Access {
    let Some(viewer) = viewer else {
        return Access::Unauthenticated;
    };

    match action {
        Action::EditPost(post) if post.author_id != viewer.id => {
            Access::NotAuthor { post_id: post.id }
        }
        Action::Protected | Action::EditPost(_) => Access::Granted,
    }
}

/// Whether `viewer` wrote `post`.
#[must_use]
pub fn is_author(viewer: Option<&user::Model>, post: &post::Model) -> bool {
    viewer.is_some_and(|v| v.id == post.author_id)
}

/// Login URL that returns to `next` afterwards.
///
/// Slashes stay readable; everything else in `next` is percent-encoded.
#[must_use]
pub fn login_url(next: &str) -> String {
    let encoded = urlencoding::encode(next).replace("%2F", "/");
    format!("{LOGIN_PATH}?next={encoded}")
}

/// Whether `next` is a local path that is safe to redirect to after login.
#[must_use]
pub fn is_safe_next(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

/// Path of a post's detail page.
#[must_use]
pub fn post_detail_path(post_id: i32) -> String {
    format!("/posts/{post_id}/")
}

/// Path of a user's profile page.
#[must_use]
pub fn profile_path(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}
