//! Threaded comments on posts

use std::collections::HashSet;

use super::{log_cache_write, non_empty, or_cached, NotificationRepository};
use crate::db::{CommentDao, LocalCache, PostDao};
use crate::error::{Error, Result};
use crate::models::{
    collections, fields, thread_comments, Comment, CommentId, CommentThread, NotificationKind,
    Post, PostId, User, UserId,
};
use crate::remote::{fetch, fetch_all, Direction, DocumentStore, Query, Write};

/// Upper bound on comments loaded for one post
const MAX_COMMENTS: usize = 500;

#[derive(Clone)]
pub struct CommentRepository<D: DocumentStore> {
    store: D,
    cache: LocalCache,
    notifications: NotificationRepository<D>,
}

impl<D: DocumentStore> CommentRepository<D> {
    pub const fn new(store: D, cache: LocalCache, notifications: NotificationRepository<D>) -> Self {
        Self {
            store,
            cache,
            notifications,
        }
    }

    /// Comments on a post, grouped into threads, oldest first
    pub async fn comments(&self, post_id: &PostId) -> Result<Vec<CommentThread>> {
        match self.load(post_id).await {
            Ok(comments) => {
                let db = self.cache.lock().await;
                log_cache_write(
                    "comments",
                    CommentDao::new(db.connection())
                        .replace_for_post(post_id, &comments)
                        .await,
                );
                Ok(thread_comments(comments))
            }
            Err(error) => {
                or_cached("comments", error, async {
                    let db = self.cache.lock().await;
                    CommentDao::new(db.connection())
                        .list_for_post(post_id, MAX_COMMENTS)
                        .await
                        .map(non_empty)
                })
                .await
                .map(thread_comments)
            }
        }
    }

    async fn load(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let query = Query::collection(collections::COMMENTS)
            .where_eq(fields::comment::POST_ID, post_id.as_str())
            .order_by(fields::comment::CREATED_AT, Direction::Ascending)
            .limit(MAX_COMMENTS);
        fetch_all::<Comment, D>(&self.store, &query).await
    }

    /// Comment on a post, or reply to one of its comments
    pub async fn add_comment(
        &self,
        author: &User,
        post_id: &PostId,
        text: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment> {
        let comment = Comment::new(*post_id, author, text, parent_id)?;
        let post = fetch::<Post, D>(&self.store, collections::POSTS, &post_id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound("This post was deleted".to_string()))?;

        let parent = match parent_id {
            Some(parent_id) => {
                let parent =
                    fetch::<Comment, D>(&self.store, collections::COMMENTS, &parent_id.as_str())
                        .await?
                        .ok_or_else(|| {
                            Error::NotFound("The comment you replied to was deleted".to_string())
                        })?;
                if &parent.post_id != post_id {
                    return Err(Error::InvalidInput(
                        "Replies must be on the same post".to_string(),
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        self.store
            .commit(vec![
                Write::set(collections::COMMENTS, comment.id.as_str(), &comment)?,
                Write::increment(
                    collections::POSTS,
                    post_id.as_str(),
                    fields::post::COMMENTS_COUNT,
                    1,
                ),
            ])
            .await?;

        {
            let db = self.cache.lock().await;
            log_cache_write("comment", CommentDao::new(db.connection()).upsert(&comment).await);
            log_cache_write(
                "comment count",
                PostDao::new(db.connection())
                    .adjust_comments_count(post_id, 1)
                    .await,
            );
        }

        self.notifications
            .notify_best_effort(
                &post.user_id,
                author,
                NotificationKind::Comment,
                Some(*post_id),
                Some(&comment.text),
            )
            .await;
        if let Some(parent) = parent.filter(|parent| parent.user_id != post.user_id) {
            self.notifications
                .notify_best_effort(
                    &parent.user_id,
                    author,
                    NotificationKind::Comment,
                    Some(*post_id),
                    Some(&comment.text),
                )
                .await;
        }
        Ok(comment)
    }

    /// Delete a comment and every reply beneath it; returns how many went
    ///
    /// Allowed for the comment's author and the post's author.
    pub async fn delete_comment(&self, viewer: &UserId, id: &CommentId) -> Result<usize> {
        let comment = fetch::<Comment, D>(&self.store, collections::COMMENTS, &id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound("This comment was already deleted".to_string()))?;
        let post =
            fetch::<Post, D>(&self.store, collections::POSTS, &comment.post_id.as_str()).await?;

        let owns_post = post.as_ref().is_some_and(|post| post.is_authored_by(viewer));
        if &comment.user_id != viewer && !owns_post {
            return Err(Error::PermissionDenied(
                "You can only delete your own comments".to_string(),
            ));
        }

        let siblings = self.load(&comment.post_id).await?;
        let doomed = descendants_of(*id, &siblings);
        let removed = i64::try_from(doomed.len()).unwrap_or(i64::MAX);

        let mut writes: Vec<Write> = doomed
            .iter()
            .map(|doomed| Write::delete(collections::COMMENTS, doomed.as_str()))
            .collect();
        if post.is_some() {
            writes.push(Write::increment(
                collections::POSTS,
                comment.post_id.as_str(),
                fields::post::COMMENTS_COUNT,
                -removed,
            ));
        }
        self.store.commit(writes).await?;
        tracing::debug!("Deleted {} comment(s) under {}", doomed.len(), id);

        let db = self.cache.lock().await;
        let dao = CommentDao::new(db.connection());
        for doomed in &doomed {
            log_cache_write("comment", dao.delete_with_replies(doomed).await);
        }
        log_cache_write(
            "comment count",
            PostDao::new(db.connection())
                .adjust_comments_count(&comment.post_id, -removed)
                .await,
        );
        Ok(doomed.len())
    }
}

/// `root` plus every comment that replies to it, directly or transitively
fn descendants_of(root: CommentId, comments: &[Comment]) -> Vec<CommentId> {
    let mut found = vec![root];
    let mut seen: HashSet<CommentId> = HashSet::from([root]);
    let mut cursor = 0;
    while cursor < found.len() {
        let current = found[cursor];
        for reply in comments {
            if reply.parent_id == Some(current) && seen.insert(reply.id) {
                found.push(reply.id);
            }
        }
        cursor += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostDraft;
    use crate::repository::testing::Harness;
    use pretty_assertions::assert_eq;

    async fn post_by(h: &Harness, author: &User) -> Post {
        let draft = PostDraft::new("look", None, vec![1, 2, 3], "a.png", "image/png").unwrap();
        h.repos.posts.create_post(author, draft).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn comments_thread_and_count() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let carol = h.seed_user("carol-id", "carol", false).await;
        let post = post_by(&h, &alice).await;

        let root = h
            .repos
            .comments
            .add_comment(&bob, &post.id, "Great light", None)
            .await
            .unwrap();
        h.repos
            .comments
            .add_comment(&carol, &post.id, "Agreed", Some(root.id))
            .await
            .unwrap();

        let threads = h.repos.comments.comments(&post.id).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.text, "Great light");
        assert_eq!(threads[0].replies.len(), 1);

        let post_now = h.repos.posts.get_post(&alice.id, &post.id).await.unwrap();
        assert_eq!(post_now.comments_count, 2);

        // post author hears about both, the parent author about the reply
        let alice_inbox = h.repos.notifications.notifications(&alice.id, 10).await.unwrap();
        assert_eq!(alice_inbox.len(), 2);
        let bob_inbox = h.repos.notifications.notifications(&bob.id, 10).await.unwrap();
        assert_eq!(bob_inbox.len(), 1);
        assert_eq!(bob_inbox[0].message, "carol commented: Agreed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reply_must_target_same_post() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let first = post_by(&h, &alice).await;
        let second = post_by(&h, &alice).await;
        let comment = h
            .repos
            .comments
            .add_comment(&alice, &first.id, "mine", None)
            .await
            .unwrap();

        let error = h
            .repos
            .comments
            .add_comment(&alice, &second.id, "wrong", Some(comment.id))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_removes_nested_replies_and_checks_owner() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let carol = h.seed_user("carol-id", "carol", false).await;
        let post = post_by(&h, &alice).await;

        let root = h
            .repos
            .comments
            .add_comment(&bob, &post.id, "root", None)
            .await
            .unwrap();
        let reply = h
            .repos
            .comments
            .add_comment(&carol, &post.id, "reply", Some(root.id))
            .await
            .unwrap();
        h.repos
            .comments
            .add_comment(&bob, &post.id, "nested", Some(reply.id))
            .await
            .unwrap();
        h.repos
            .comments
            .add_comment(&carol, &post.id, "other", None)
            .await
            .unwrap();

        let denied = h.repos.comments.delete_comment(&carol.id, &root.id).await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));

        // the post author may moderate
        let removed = h.repos.comments.delete_comment(&alice.id, &root.id).await.unwrap();
        assert_eq!(removed, 3);

        let threads = h.repos.comments.comments(&post.id).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.text, "other");
        let post_now = h.repos.posts.get_post(&alice.id, &post.id).await.unwrap();
        assert_eq!(post_now.comments_count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cached_comments_served_offline() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let post = post_by(&h, &alice).await;
        h.repos
            .comments
            .add_comment(&alice, &post.id, "first!", None)
            .await
            .unwrap();
        h.repos.comments.comments(&post.id).await.unwrap();

        h.offline(true);
        let threads = h.repos.comments.comments(&post.id).await.unwrap();
        assert_eq!(threads[0].comment.text, "first!");
        assert!(h
            .repos
            .comments
            .add_comment(&alice, &post.id, "second", None)
            .await
            .unwrap_err()
            .is_network());
    }

    #[test]
    fn descendants_follow_reply_chains() {
        let author = User::new(UserId::new("u"), "user", "u@example.com", "");
        let post = PostId::new();
        let root = Comment::new(post, &author, "root", None).unwrap();
        let child = Comment::new(post, &author, "child", Some(root.id)).unwrap();
        let grandchild = Comment::new(post, &author, "grandchild", Some(child.id)).unwrap();
        let unrelated = Comment::new(post, &author, "unrelated", None).unwrap();

        let found = descendants_of(
            root.id,
            &[unrelated, grandchild.clone(), child.clone(), root.clone()],
        );
        assert_eq!(found.len(), 3);
        assert!(found.contains(&grandchild.id));
        assert!(found.contains(&child.id));
    }
}
