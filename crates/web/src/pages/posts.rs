//! Feeds, post detail, post form and comments.

use axum::{
    Form,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::Uri,
    response::Response,
};
use yatube_common::AppError;
use yatube_core::{
    CommentInput, FeedSource, FormErrors, ImageUpload, PostInput, Submission, authorize,
    authorization::{Action, is_author, post_detail_path, profile_path},
};
use yatube_db::entities::{post, user};

use crate::extractors::{AuthUser, MaybeAuthUser, PageQuery};
use crate::middleware::AppState;
use crate::response::{PageError, PageResult, found, render};
use crate::views::{
    Chrome, CommentCard, GroupOption, GroupTemplate, IndexTemplate, Paginator, PostCard,
    PostDetailTemplate, PostFormTemplate, ProfileTemplate, post_cards,
};

/// Global feed.
pub async fn index(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    query: PageQuery,
) -> PageResult {
    let page = state
        .feed_service
        .feed(&FeedSource::All, query.number())
        .await?;

    render(IndexTemplate {
        chrome: Chrome::new("Latest updates", viewer.as_ref()),
        posts: post_cards(&page),
        paginator: Paginator::from(&page),
    })
}

/// Posts of one group.
pub async fn group_posts(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(slug): Path<String>,
    query: PageQuery,
) -> PageResult {
    let group = state.group_service.get_by_slug(&slug).await?;
    let page = state
        .feed_service
        .feed(&FeedSource::Group(group.clone()), query.number())
        .await?;

    render(GroupTemplate {
        chrome: Chrome::new(format!("Posts of {}", group.title), viewer.as_ref()),
        group_title: group.title,
        group_description: group.description,
        posts: post_cards(&page),
        paginator: Paginator::from(&page),
    })
}

/// A user's posts and the follow button.
pub async fn profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(username): Path<String>,
    query: PageQuery,
) -> PageResult {
    let author = state.user_service.get_by_username(&username).await?;
    let page = state
        .feed_service
        .feed(&FeedSource::Author(author.clone()), query.number())
        .await?;
    let following = state
        .following_service
        .following_flag(viewer.as_ref(), &author)
        .await?;
    let follower_count = state.following_service.follower_count(&author.id).await?;
    let can_follow = viewer.as_ref().is_some_and(|v| v.id != author.id);
    let profile = profile_path(&author.username);

    render(ProfileTemplate {
        chrome: Chrome::new(
            format!("Profile of {}", author.display_name()),
            viewer.as_ref(),
        ),
        author_name: author.display_name(),
        post_count: page.total_items,
        follower_count,
        following,
        can_follow,
        follow_href: format!("{profile}follow/"),
        unfollow_href: format!("{profile}unfollow/"),
        author_username: author.username,
        posts: post_cards(&page),
        paginator: Paginator::from(&page),
    })
}

/// A post with its comments.
pub async fn post_detail(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(post_id): Path<String>,
) -> PageResult {
    let post_id = parse_post_id(&post_id)?;
    render_detail(&state, viewer.as_ref(), post_id, String::new(), FormErrors::new()).await
}

/// Empty post form.
pub async fn post_create_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> PageResult {
    render_post_form(&state, &user, None, &PostInput::default(), FormErrors::new()).await
}

/// Publish a post, then go to the author's profile.
pub async fn post_create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> PageResult {
    let (input, image) = read_post_form(multipart).await?;

    match state
        .post_service
        .create(&user, input.clone(), image)
        .await?
    {
        Submission::Accepted(_) => Ok(found(&profile_path(&user.username))),
        Submission::Rejected(errors) => {
            render_post_form(&state, &user, None, &input, errors).await
        }
    }
}

/// Prefilled edit form. Only the author gets it.
pub async fn post_edit_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
    uri: Uri,
) -> PageResult {
    let post = state.post_service.get(parse_post_id(&post_id)?).await?;
    if let Some(target) = authorize(Some(&user), Action::EditPost(&post)).redirect_target(uri.path())
    {
        return Ok(found(&target));
    }

    let input = PostInput::from_post(&post);
    render_post_form(&state, &user, Some(&post), &input, FormErrors::new()).await
}

/// Save an edit, then go to the post.
pub async fn post_edit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
    uri: Uri,
    multipart: Multipart,
) -> PageResult {
    let post = state.post_service.get(parse_post_id(&post_id)?).await?;
    if let Some(target) = authorize(Some(&user), Action::EditPost(&post)).redirect_target(uri.path())
    {
        tracing::debug!(post_id = post.id, user = %user.username, "Edit by non-author refused");
        return Ok(found(&target));
    }

    let (input, image) = read_post_form(multipart).await?;
    match state
        .post_service
        .update(&user, post.clone(), input.clone(), image)
        .await?
    {
        Submission::Accepted(updated) => Ok(found(&post_detail_path(updated.id))),
        Submission::Rejected(errors) => {
            render_post_form(&state, &user, Some(&post), &input, errors).await
        }
    }
}

/// The detail page, reached through the comment URL.
pub async fn comment_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
) -> PageResult {
    let post_id = parse_post_id(&post_id)?;
    render_detail(&state, Some(&user), post_id, String::new(), FormErrors::new()).await
}

/// Add a comment, then go back to the post.
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
    Form(input): Form<CommentInput>,
) -> PageResult {
    let post_id = parse_post_id(&post_id)?;

    match state
        .comment_service
        .add(&user, post_id, input.clone())
        .await?
    {
        Submission::Accepted(_) => Ok(found(&post_detail_path(post_id))),
        Submission::Rejected(errors) => {
            render_detail(&state, Some(&user), post_id, input.text, errors).await
        }
    }
}

/// Post IDs are integers; anything else names no post.
fn parse_post_id(raw: &str) -> Result<i32, PageError> {
    raw.parse::<i32>()
        .map_err(|_| PageError(AppError::PostNotFound(raw.to_string())))
}

async fn render_detail(
    state: &AppState,
    viewer: Option<&user::Model>,
    post_id: i32,
    comment_text: String,
    errors: FormErrors,
) -> PageResult {
    let detail = state.post_service.detail(post_id).await?;
    let can_edit = is_author(viewer, &detail.view.post);

    render(PostDetailTemplate {
        chrome: Chrome::new(detail.title(), viewer),
        post: PostCard::from(&detail.view),
        author_post_count: detail.author_post_count,
        can_edit,
        edit_href: format!("{}edit/", post_detail_path(post_id)),
        can_comment: viewer.is_some(),
        comment_action: format!("{}comment/", post_detail_path(post_id)),
        comment_text,
        errors,
        comments: detail.comments.iter().map(CommentCard::from).collect(),
    })
}

async fn render_post_form(
    state: &AppState,
    user: &user::Model,
    editing: Option<&post::Model>,
    input: &PostInput,
    errors: FormErrors,
) -> PageResult {
    let groups = state.post_service.group_choices().await?;
    let (title, action) = match editing {
        Some(post) => ("Edit post", format!("{}edit/", post_detail_path(post.id))),
        None => ("New post", "/create/".to_string()),
    };

    render(PostFormTemplate {
        chrome: Chrome::new(title, Some(user)),
        is_edit: editing.is_some(),
        action,
        text: input.text.clone(),
        groups: GroupOption::list(&groups, input.group_id()),
        current_image: editing
            .and_then(|post| post.image.as_deref())
            .map(|key| state.post_service.image_url(key)),
        errors,
    })
}

/// Read the multipart post form: `text`, `group`, `image` and `image-clear`.
async fn read_post_form(
    mut multipart: Multipart,
) -> Result<(PostInput, Option<ImageUpload>), PageError> {
    let mut input = PostInput::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => input.text = field.text().await.map_err(bad_form)?,
            "group" => input.group = Some(field.text().await.map_err(bad_form)?),
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_form)?;
                if !data.is_empty() {
                    image = Some(ImageUpload { filename, data });
                }
            }
            "image-clear" => input.clear_image = true,
            _ => {}
        }
    }

    Ok((input, image))
}

fn bad_form(e: MultipartError) -> PageError {
    PageError(AppError::BadRequest(e.body_text()))
}

/// Shown for any unmatched path.
pub async fn not_found(uri: Uri) -> Response {
    crate::response::not_found_page(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_id() {
        assert_eq!(parse_post_id("42").unwrap(), 42);
        assert!(parse_post_id("abc").is_err());
        assert!(parse_post_id("99999999999").is_err());
    }
}
