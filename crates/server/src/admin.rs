//! Administrative commands run against the database directly.

use yatube_core::{CreateGroupInput, GroupService, PostService, UserService};

use crate::cli::CreateGroupArgs;

pub async fn create_group(groups: &GroupService, args: CreateGroupArgs) -> anyhow::Result<()> {
    let group = groups
        .create(CreateGroupInput {
            title: args.title,
            slug: args.slug,
            description: args.description,
        })
        .await?;

    println!("created group {} ({})", group.slug, group.id);
    Ok(())
}

pub async fn delete_group(groups: &GroupService, slug: &str) -> anyhow::Result<()> {
    let group = groups.delete_by_slug(slug).await?;
    println!("deleted group {}", group.slug);
    Ok(())
}

/// Delete a user; their posts cascade away, and their images are removed afterwards.
pub async fn delete_user(
    users: &UserService,
    posts: &PostService,
    username: &str,
) -> anyhow::Result<()> {
    let user = users.get_by_username(username).await?;
    let images = posts.image_keys_by_author(&user.id).await?;

    let user = users.delete_by_username(username).await?;
    posts.discard_images(&images).await;
    println!("deleted user {} ({} images)", user.username, images.len());
    Ok(())
}

pub async fn delete_post(posts: &PostService, id: i32) -> anyhow::Result<()> {
    let post = posts.delete(id).await?;
    println!("deleted post {}", post.id);
    Ok(())
}
