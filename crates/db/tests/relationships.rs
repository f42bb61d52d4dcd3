//! Cascade and ordering behaviour against a migrated SQLite database.

use yatube_db::repositories::{
    CommentRepository, FollowRepository, GroupRepository, PostFilter, PostRepository,
    UserRepository,
};
use yatube_db::test_utils::TestDatabase;

#[tokio::test]
async fn deleting_user_removes_posts_comments_and_edges() {
    let db = TestDatabase::new().await.unwrap();
    let alice = db.insert_user("alice").await.unwrap();
    let bob = db.insert_user("bob").await.unwrap();

    let alice_post = db.insert_post(&alice, None, "by alice").await.unwrap();
    let bob_post = db.insert_post(&bob, None, "by bob").await.unwrap();
    db.insert_comment(&alice, &bob_post, "alice on bob").await.unwrap();
    db.insert_comment(&bob, &alice_post, "bob on alice").await.unwrap();
    db.insert_follow(&alice, &bob).await.unwrap();
    db.insert_follow(&bob, &alice).await.unwrap();

    let users = UserRepository::new(db.conn());
    let posts = PostRepository::new(db.conn());
    let comments = CommentRepository::new(db.conn());
    let follows = FollowRepository::new(db.conn());

    assert!(users.delete(&alice.id).await.unwrap());

    assert!(posts.find_by_id(alice_post.id).await.unwrap().is_none());
    assert!(posts.find_by_id(bob_post.id).await.unwrap().is_some());
    assert!(comments.find_by_post(bob_post.id).await.unwrap().is_empty());
    assert!(comments.find_by_post(alice_post.id).await.unwrap().is_empty());
    assert!(!follows.is_following(&alice.id, &bob.id).await.unwrap());
    assert!(!follows.is_following(&bob.id, &alice.id).await.unwrap());
}

#[tokio::test]
async fn deleting_group_keeps_posts_ungrouped() {
    let db = TestDatabase::new().await.unwrap();
    let author = db.insert_user("author").await.unwrap();
    let group = db.insert_group("Cats", "cats").await.unwrap();
    let post = db.insert_post(&author, Some(&group), "grouped").await.unwrap();

    let groups = GroupRepository::new(db.conn());
    let posts = PostRepository::new(db.conn());

    assert!(groups.delete(&group.id).await.unwrap());

    let survivor = posts.get_by_id(post.id).await.unwrap();
    assert_eq!(survivor.group_id, None);
    assert_eq!(survivor.text, "grouped");
}

#[tokio::test]
async fn deleting_post_removes_its_comments() {
    let db = TestDatabase::new().await.unwrap();
    let author = db.insert_user("author").await.unwrap();
    let post = db.insert_post(&author, None, "doomed").await.unwrap();
    db.insert_comment(&author, &post, "first").await.unwrap();

    let posts = PostRepository::new(db.conn());
    let comments = CommentRepository::new(db.conn());

    assert!(posts.delete(post.id).await.unwrap());
    assert!(comments.find_by_post(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn follow_pair_is_unique() {
    let db = TestDatabase::new().await.unwrap();
    let alice = db.insert_user("alice").await.unwrap();
    let bob = db.insert_user("bob").await.unwrap();

    db.insert_follow(&alice, &bob).await.unwrap();
    assert!(db.insert_follow(&alice, &bob).await.is_err());
}

#[tokio::test]
async fn window_is_newest_first_with_id_tiebreak() {
    let db = TestDatabase::new().await.unwrap();
    let author = db.insert_user("author").await.unwrap();
    let older = db.insert_posts(&author, None, 3, 0).await.unwrap();
    let same_instant = yatube_db::test_utils::fixture_epoch() + chrono::Duration::seconds(100);
    let tie_a = db.insert_post_at(&author, None, "tie a", same_instant).await.unwrap();
    let tie_b = db.insert_post_at(&author, None, "tie b", same_instant).await.unwrap();

    let posts = PostRepository::new(db.conn());
    let window = posts.find_window(&PostFilter::All, 0, 10).await.unwrap();
    let ids: Vec<i32> = window.iter().map(|p| p.id).collect();

    assert_eq!(ids, vec![tie_b.id, tie_a.id, older[2].id, older[1].id, older[0].id]);
}

#[tokio::test]
async fn comment_counts_are_grouped_per_post() {
    let db = TestDatabase::new().await.unwrap();
    let author = db.insert_user("author").await.unwrap();
    let busy = db.insert_post(&author, None, "busy").await.unwrap();
    let quiet = db.insert_post(&author, None, "quiet").await.unwrap();
    db.insert_comment(&author, &busy, "one").await.unwrap();
    db.insert_comment(&author, &busy, "two").await.unwrap();

    let comments = CommentRepository::new(db.conn());
    let counts = comments.count_by_posts(&[busy.id, quiet.id]).await.unwrap();

    assert_eq!(counts.get(&busy.id), Some(&2));
    assert_eq!(counts.get(&quiet.id), None);
}

#[tokio::test]
async fn email_lookup_ignores_case() {
    let db = TestDatabase::new().await.unwrap();
    let alice = db.insert_user("alice").await.unwrap();
    db.insert_user("bob").await.unwrap();
    let users = UserRepository::new(db.conn());

    let found = users.find_by_email(" ALICE@Example.com ").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, alice.id);
    assert!(users.find_by_email("nobody@example.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn image_keys_skip_posts_without_images() {
    let db = TestDatabase::new().await.unwrap();
    let alice = db.insert_user("alice").await.unwrap();
    db.insert_post(&alice, None, "plain").await.unwrap();
    let posts = PostRepository::new(db.conn());

    let filter = PostFilter::Author(alice.id.clone());
    assert!(posts.find_image_keys(&filter).await.unwrap().is_empty());
}
