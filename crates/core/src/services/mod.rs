//! Business logic services.

#![allow(missing_docs)]

pub mod authorization;
pub mod comment;
pub mod email;
pub mod feed;
pub mod following;
pub mod group;
pub mod media;
pub mod password_reset;
pub mod post;
pub mod user;

pub use authorization::{Access, Action, authorize, is_author, is_safe_next, login_url};
pub use comment::{CommentInput, CommentService, CommentView};
pub use email::{LettreMailer, Mail, Mailer};
pub use feed::{FeedService, FeedSource, PAGE_SIZE, Page, PostView, PostViewLoader, parse_page};
pub use following::{FollowOutcome, FollowingService};
pub use group::{CreateGroupInput, GroupService};
pub use media::{ImageService, ImageUpload};
pub use password_reset::{
    PasswordResetInput, PasswordResetService, SetPasswordInput, reset_link_path,
};
pub use post::{PostDetail, PostInput, PostService};
pub use user::{LoginInput, PasswordChangeInput, Session, SignupInput, UserService};
