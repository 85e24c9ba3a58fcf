//! Posts, likes, bookmarks, the home feed and explore listings

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use super::{
    delete_matching, log_cache_write, non_empty, or_cached, query_in_chunks,
    NotificationRepository, PAGE_SIZE,
};
use crate::db::{CategoryDao, CommentDao, LocalCache, PostDao, UserDao};
use crate::error::{Error, Result};
use crate::models::{
    bookmark_document_id, collections, fields, like_document_id, normalize_category,
    validate_caption, Bookmark, Category, Follow, Like, NotificationKind, Post, PostDraft, PostId,
    User, UserId,
};
use crate::remote::{fetch, fetch_all, Direction, DocumentStore, Fields, Query, Write};
use crate::storage::{MediaKind, MediaStorage};
use crate::util::now_millis;

#[derive(Clone)]
pub struct PostRepository<D: DocumentStore, M: MediaStorage> {
    store: D,
    media: M,
    cache: LocalCache,
    notifications: NotificationRepository<D>,
}

impl<D: DocumentStore, M: MediaStorage> PostRepository<D, M> {
    pub const fn new(
        store: D,
        media: M,
        cache: LocalCache,
        notifications: NotificationRepository<D>,
    ) -> Self {
        Self {
            store,
            media,
            cache,
            notifications,
        }
    }

    /// Upload the image and publish the post
    ///
    /// The post document, the author's post counter and the category counter
    /// are written in one batch. The uploaded image is removed again when
    /// that batch fails.
    pub async fn create_post(&self, author: &User, mut draft: PostDraft) -> Result<Post> {
        let key = self
            .media
            .build_media_key(MediaKind::PostImage, author.id.as_str(), &draft.file_name)?;
        let bytes = std::mem::take(&mut draft.image_bytes);
        let url = self
            .media
            .upload(&key, bytes, Some(&draft.content_type))
            .await?;

        let post = Post::new(author, &draft, url, key.clone());
        let mut writes = vec![
            Write::set(collections::POSTS, post.id.as_str(), &post)?,
            Write::increment(
                collections::USERS,
                author.id.as_str(),
                fields::user::POSTS_COUNT,
                1,
            ),
        ];
        if let Some(category) = &post.category {
            writes.extend(category_writes(category, 1, post.created_at));
        }

        if let Err(error) = self.store.commit(writes).await {
            if let Err(cleanup) = self.media.delete(&key).await {
                tracing::warn!("Failed to remove orphaned post image {}: {}", key, cleanup);
            }
            return Err(error);
        }
        tracing::info!("Published post {} by {}", post.id, author.id);

        let db = self.cache.lock().await;
        log_cache_write("post", PostDao::new(db.connection()).upsert(&post, true).await);
        log_cache_write(
            "post count",
            UserDao::new(db.connection())
                .adjust_counts(&author.id, 0, 0, 1)
                .await,
        );
        if let Some(category) = &post.category {
            log_cache_write(
                "category",
                CategoryDao::new(db.connection())
                    .adjust_count(category, 1, post.created_at)
                    .await,
            );
        }
        Ok(post)
    }

    /// One post with the viewer's like/bookmark flags
    pub async fn get_post(&self, viewer: &UserId, id: &PostId) -> Result<Post> {
        let remote = async {
            let Some(mut post) =
                fetch::<Post, D>(&self.store, collections::POSTS, &id.as_str()).await?
            else {
                return Ok(None);
            };
            self.resolve_flags(viewer, std::slice::from_mut(&mut post))
                .await?;
            Ok::<_, Error>(Some(post))
        };

        match remote.await {
            Ok(Some(post)) => {
                let db = self.cache.lock().await;
                log_cache_write("post", PostDao::new(db.connection()).upsert(&post, false).await);
                Ok(post)
            }
            Ok(None) => {
                let db = self.cache.lock().await;
                log_cache_write("post", PostDao::new(db.connection()).delete(id).await);
                Err(Error::NotFound("This post was deleted".to_string()))
            }
            Err(error) => {
                or_cached("post", error, async {
                    let db = self.cache.lock().await;
                    PostDao::new(db.connection()).get(id).await
                })
                .await
            }
        }
    }

    /// Delete one of the viewer's posts with everything hanging off it
    pub async fn delete_post(&self, viewer: &UserId, id: &PostId) -> Result<()> {
        let post = fetch::<Post, D>(&self.store, collections::POSTS, &id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound("This post was already deleted".to_string()))?;
        if !post.is_authored_by(viewer) {
            return Err(Error::PermissionDenied(
                "You can only delete your own posts".to_string(),
            ));
        }

        let mut writes = vec![
            Write::delete(collections::POSTS, id.as_str()),
            Write::increment(
                collections::USERS,
                viewer.as_str(),
                fields::user::POSTS_COUNT,
                -1,
            ),
        ];
        if let Some(category) = &post.category {
            writes.extend(category_writes(category, -1, post.created_at));
        }
        self.store.commit(writes).await?;
        tracing::info!("Deleted post {}", id);

        self.cleanup_post(&post).await;

        let db = self.cache.lock().await;
        log_cache_write("post", PostDao::new(db.connection()).delete(id).await);
        log_cache_write(
            "comments",
            CommentDao::new(db.connection()).delete_for_post(id).await,
        );
        log_cache_write(
            "post count",
            UserDao::new(db.connection())
                .adjust_counts(viewer, 0, 0, -1)
                .await,
        );
        if let Some(category) = &post.category {
            log_cache_write(
                "category",
                CategoryDao::new(db.connection())
                    .adjust_count(category, -1, 0)
                    .await,
            );
        }
        Ok(())
    }

    /// Best-effort removal of a deleted post's comments, likes, bookmarks,
    /// notifications and image
    pub(crate) async fn cleanup_post(&self, post: &Post) {
        let post_id = post.id.as_str();
        for collection in [
            collections::COMMENTS,
            collections::LIKES,
            collections::BOOKMARKS,
            collections::NOTIFICATIONS,
        ] {
            delete_matching(
                &self.store,
                Query::collection(collection).where_eq(fields::edge::POST_ID, post_id.as_str()),
            )
            .await;
        }
        if !post.image_key.is_empty() {
            if let Err(error) = self.media.delete(&post.image_key).await {
                tracing::warn!("Failed to delete image {}: {}", post.image_key, error);
            }
        }
    }

    pub async fn update_caption(&self, viewer: &UserId, id: &PostId, caption: &str) -> Result<Post> {
        let caption = validate_caption(caption)?;
        let mut post = self.get_post(viewer, id).await?;
        if !post.is_authored_by(viewer) {
            return Err(Error::PermissionDenied(
                "You can only edit your own posts".to_string(),
            ));
        }

        post.set_caption(caption);
        let mut changed = Fields::new();
        changed.insert(fields::post::CAPTION.to_string(), json!(post.caption));
        changed.insert(fields::post::TAGS.to_string(), json!(post.tags));
        self.store
            .commit(vec![Write::update(collections::POSTS, id.as_str(), changed)])
            .await?;

        let db = self.cache.lock().await;
        log_cache_write("post", PostDao::new(db.connection()).upsert(&post, false).await);
        Ok(post)
    }

    /// Newest posts from accounts the viewer follows, plus the viewer's own
    pub async fn feed(&self, viewer: &UserId, limit: usize) -> Result<Vec<Post>> {
        match self.load_feed(viewer, limit).await {
            Ok(posts) => {
                let db = self.cache.lock().await;
                log_cache_write("feed", PostDao::new(db.connection()).replace_feed(&posts).await);
                Ok(posts)
            }
            Err(error) => {
                or_cached("feed", error, async {
                    let db = self.cache.lock().await;
                    PostDao::new(db.connection())
                        .list_feed(limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    async fn load_feed(&self, viewer: &UserId, limit: usize) -> Result<Vec<Post>> {
        let edges = Query::collection(collections::FOLLOWS)
            .where_eq(fields::edge::FOLLOWER_ID, viewer.as_str())
            .where_eq(fields::edge::ACCEPTED, true);
        let mut authors: Vec<Value> = fetch_all::<Follow, D>(&self.store, &edges)
            .await?
            .into_iter()
            .map(|edge| json!(edge.followee_id.as_str()))
            .collect();
        authors.push(json!(viewer.as_str()));

        let mut posts: Vec<Post> = query_in_chunks(
            &self.store,
            || {
                Query::collection(collections::POSTS)
                    .order_by(fields::post::CREATED_AT, Direction::Descending)
                    .limit(limit)
            },
            fields::post::USER_ID,
            &authors,
        )
        .await?;
        sort_newest_first(&mut posts);
        posts.truncate(limit);

        self.resolve_flags(viewer, &mut posts).await?;
        Ok(posts)
    }

    pub async fn user_posts(&self, viewer: &UserId, user_id: &UserId, limit: usize) -> Result<Vec<Post>> {
        let query = Query::collection(collections::POSTS)
            .where_eq(fields::post::USER_ID, user_id.as_str())
            .order_by(fields::post::CREATED_AT, Direction::Descending)
            .limit(limit);
        match self.list(viewer, &query).await {
            Ok(posts) => Ok(posts),
            Err(error) => {
                or_cached("user posts", error, async {
                    let db = self.cache.lock().await;
                    PostDao::new(db.connection())
                        .list_by_user(user_id, limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    pub async fn category_posts(
        &self,
        viewer: &UserId,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let category = normalize_category(category)
            .ok_or_else(|| Error::InvalidInput("Pick a category".to_string()))?;
        let query = Query::collection(collections::POSTS)
            .where_eq(fields::post::CATEGORY, category.as_str())
            .order_by(fields::post::CREATED_AT, Direction::Descending)
            .limit(limit);
        match self.list(viewer, &query).await {
            Ok(posts) => Ok(posts),
            Err(error) => {
                or_cached("category posts", error, async {
                    let db = self.cache.lock().await;
                    PostDao::new(db.connection())
                        .list_by_category(&category, limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    /// Posts carrying `#tag`, newest first
    pub async fn tagged_posts(&self, viewer: &UserId, tag: &str, limit: usize) -> Result<Vec<Post>> {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if tag.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::collection(collections::POSTS)
            .where_array_contains(fields::post::TAGS, tag.as_str())
            .limit(limit);
        match self.list(viewer, &query).await {
            Ok(mut posts) => {
                sort_newest_first(&mut posts);
                Ok(posts)
            }
            Err(error) => {
                or_cached("tagged posts", error, async {
                    let db = self.cache.lock().await;
                    let posts = PostDao::new(db.connection())
                        .list_trending(PAGE_SIZE * 4)
                        .await?;
                    let mut tagged: Vec<Post> = posts
                        .into_iter()
                        .filter(|post| post.tags.contains(&tag))
                        .collect();
                    sort_newest_first(&mut tagged);
                    tagged.truncate(limit);
                    Ok(non_empty(tagged))
                })
                .await
            }
        }
    }

    /// Most liked posts
    pub async fn trending_posts(&self, viewer: &UserId, limit: usize) -> Result<Vec<Post>> {
        let query = Query::collection(collections::POSTS)
            .order_by(fields::post::LIKES_COUNT, Direction::Descending)
            .limit(limit);
        match self.list(viewer, &query).await {
            Ok(posts) => Ok(posts),
            Err(error) => {
                or_cached("trending posts", error, async {
                    let db = self.cache.lock().await;
                    PostDao::new(db.connection())
                        .list_trending(limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    /// Categories ordered by how many posts use them
    pub async fn trending_categories(&self, limit: usize) -> Result<Vec<Category>> {
        let query = Query::collection(collections::CATEGORIES)
            .order_by(fields::category::POST_COUNT, Direction::Descending)
            .limit(limit);
        match fetch_all::<Category, D>(&self.store, &query).await {
            Ok(categories) => {
                let categories: Vec<Category> = categories
                    .into_iter()
                    .filter(|category| category.post_count > 0)
                    .collect();
                let db = self.cache.lock().await;
                log_cache_write(
                    "categories",
                    CategoryDao::new(db.connection())
                        .upsert_many(&categories)
                        .await,
                );
                Ok(categories)
            }
            Err(error) => {
                or_cached("categories", error, async {
                    let db = self.cache.lock().await;
                    CategoryDao::new(db.connection())
                        .list_popular(limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    /// Like or unlike; returns the post as it now stands
    pub async fn toggle_like(&self, viewer: &User, post_id: &PostId) -> Result<Post> {
        let mut post = fetch::<Post, D>(&self.store, collections::POSTS, &post_id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound("This post was deleted".to_string()))?;
        let like_id = like_document_id(post_id, &viewer.id);
        let liked = self.store.get(collections::LIKES, &like_id).await?.is_some();

        let (edge, delta) = if liked {
            (Write::delete(collections::LIKES, like_id), -1)
        } else {
            let like = Like::new(*post_id, viewer.id.clone());
            (Write::set(collections::LIKES, like_id, &like)?, 1)
        };
        self.store
            .commit(vec![
                edge,
                Write::increment(
                    collections::POSTS,
                    post_id.as_str(),
                    fields::post::LIKES_COUNT,
                    delta,
                ),
            ])
            .await?;

        post.is_liked = liked;
        post.apply_like_toggle();
        post.is_bookmarked = self
            .store
            .get(
                collections::BOOKMARKS,
                &bookmark_document_id(&viewer.id, post_id),
            )
            .await
            .map(|doc| doc.is_some())
            .unwrap_or(false);

        {
            let db = self.cache.lock().await;
            log_cache_write("post", PostDao::new(db.connection()).upsert(&post, false).await);
        }
        if post.is_liked {
            self.notifications
                .notify_best_effort(&post.user_id, viewer, NotificationKind::Like, Some(*post_id), None)
                .await;
        }
        Ok(post)
    }

    /// Bookmark or un-bookmark; returns whether the post is now bookmarked
    pub async fn toggle_bookmark(&self, viewer: &UserId, post_id: &PostId) -> Result<bool> {
        let bookmark_id = bookmark_document_id(viewer, post_id);
        let bookmarked = self
            .store
            .get(collections::BOOKMARKS, &bookmark_id)
            .await?
            .is_some();
        let write = if bookmarked {
            Write::delete(collections::BOOKMARKS, bookmark_id)
        } else {
            if fetch::<Post, D>(&self.store, collections::POSTS, &post_id.as_str())
                .await?
                .is_none()
            {
                return Err(Error::NotFound("This post was deleted".to_string()));
            }
            let bookmark = Bookmark::new(viewer.clone(), *post_id);
            Write::set(collections::BOOKMARKS, bookmark_id, &bookmark)?
        };
        self.store.commit(vec![write]).await?;

        let db = self.cache.lock().await;
        log_cache_write(
            "bookmark",
            PostDao::new(db.connection())
                .set_bookmarked(post_id, !bookmarked)
                .await,
        );
        Ok(!bookmarked)
    }

    /// The viewer's bookmarks, most recently saved first
    pub async fn bookmarked_posts(&self, viewer: &UserId, limit: usize) -> Result<Vec<Post>> {
        match self.load_bookmarked(viewer, limit).await {
            Ok(posts) => {
                let db = self.cache.lock().await;
                log_cache_write(
                    "bookmarks",
                    PostDao::new(db.connection()).upsert_many(&posts).await,
                );
                Ok(posts)
            }
            Err(error) => {
                or_cached("bookmarks", error, async {
                    let db = self.cache.lock().await;
                    PostDao::new(db.connection())
                        .list_bookmarked(limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    async fn load_bookmarked(&self, viewer: &UserId, limit: usize) -> Result<Vec<Post>> {
        let query = Query::collection(collections::BOOKMARKS)
            .where_eq(fields::edge::USER_ID, viewer.as_str())
            .order_by(fields::edge::CREATED_AT, Direction::Descending)
            .limit(limit);
        let bookmarks = fetch_all::<Bookmark, D>(&self.store, &query).await?;
        let ids: Vec<Value> = bookmarks
            .iter()
            .map(|bookmark| json!(bookmark.post_id.as_str()))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<Post> = query_in_chunks(
            &self.store,
            || Query::collection(collections::POSTS),
            "id",
            &ids,
        )
        .await?;
        let mut by_id: HashMap<PostId, Post> =
            found.into_iter().map(|post| (post.id, post)).collect();
        let mut posts: Vec<Post> = bookmarks
            .iter()
            .filter_map(|bookmark| by_id.remove(&bookmark.post_id))
            .collect();
        self.resolve_flags(viewer, &mut posts).await?;
        Ok(posts)
    }

    async fn list(&self, viewer: &UserId, query: &Query) -> Result<Vec<Post>> {
        let mut posts = fetch_all::<Post, D>(&self.store, query).await?;
        self.resolve_flags(viewer, &mut posts).await?;
        let db = self.cache.lock().await;
        log_cache_write("posts", PostDao::new(db.connection()).upsert_many(&posts).await);
        Ok(posts)
    }

    /// Fill in `is_liked` / `is_bookmarked` for the viewer
    async fn resolve_flags(&self, viewer: &UserId, posts: &mut [Post]) -> Result<()> {
        if posts.is_empty() {
            return Ok(());
        }
        let ids: Vec<Value> = posts.iter().map(|post| json!(post.id.as_str())).collect();
        let by_viewer = move |collection: &'static str| {
            move || Query::collection(collection).where_eq(fields::edge::USER_ID, viewer.as_str())
        };

        let likes: Vec<Like> = query_in_chunks(
            &self.store,
            by_viewer(collections::LIKES),
            fields::edge::POST_ID,
            &ids,
        )
        .await?;
        let bookmarks: Vec<Bookmark> = query_in_chunks(
            &self.store,
            by_viewer(collections::BOOKMARKS),
            fields::edge::POST_ID,
            &ids,
        )
        .await?;

        let liked: HashSet<PostId> = likes.into_iter().map(|like| like.post_id).collect();
        let saved: HashSet<PostId> = bookmarks
            .into_iter()
            .map(|bookmark| bookmark.post_id)
            .collect();
        for post in posts {
            post.is_liked = liked.contains(&post.id);
            post.is_bookmarked = saved.contains(&post.id);
        }
        Ok(())
    }

    /// Every post by `user_id`, for account deletion
    pub(crate) async fn delete_all_by(&self, user_id: &UserId) {
        let query = Query::collection(collections::POSTS)
            .where_eq(fields::post::USER_ID, user_id.as_str());
        match fetch_all::<Post, D>(&self.store, &query).await {
            Ok(posts) => {
                for post in &posts {
                    if let Err(error) = self
                        .store
                        .commit(vec![Write::delete(collections::POSTS, post.id.as_str())])
                        .await
                    {
                        tracing::warn!("Failed to delete post {}: {}", post.id, error);
                        continue;
                    }
                    if let Some(category) = &post.category {
                        if let Err(error) = self
                            .store
                            .commit(category_writes(category, -1, now_millis()))
                            .await
                        {
                            tracing::warn!("Failed to update category {}: {}", category, error);
                        }
                    }
                    self.cleanup_post(post).await;
                }
            }
            Err(error) => tracing::warn!("Failed to list posts of {}: {}", user_id, error),
        }
        let db = self.cache.lock().await;
        log_cache_write(
            "posts",
            PostDao::new(db.connection()).delete_by_user(user_id).await,
        );
    }
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Keep the category document in step with a post appearing or going away
fn category_writes(category: &str, delta: i64, used_at: i64) -> Vec<Write> {
    let mut writes = Vec::with_capacity(2);
    if delta > 0 {
        let mut touched = Fields::new();
        touched.insert(fields::category::NAME.to_string(), json!(category));
        touched.insert(fields::category::LAST_USED_AT.to_string(), json!(used_at));
        writes.push(Write::merge(collections::CATEGORIES, category, touched));
    }
    writes.push(Write::increment(
        collections::CATEGORIES,
        category,
        fields::category::POST_COUNT,
        delta,
    ));
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::Harness;
    use pretty_assertions::assert_eq;

    fn draft(caption: &str, category: Option<&str>) -> PostDraft {
        PostDraft::new(caption, category, vec![0xFF, 0xD8, 0xFF], "photo.jpg", "image/jpeg").unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_post_uploads_and_updates_counters() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;

        let post = h
            .repos
            .posts
            .create_post(&alice, draft("Sunset #beach #Golden", Some("Travel")))
            .await
            .unwrap();
        assert_eq!(post.tags, vec!["beach", "golden"]);
        assert_eq!(post.category.as_deref(), Some("travel"));
        assert!(h.media.object(&post.image_key).is_some());

        let author = h.repos.users.get_user(&alice.id).await.unwrap();
        assert_eq!(author.posts_count, 1);

        let categories = h.repos.posts.trending_categories(10).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "travel");
        assert_eq!(categories[0].post_count, 1);

        let by_category = h
            .repos
            .posts
            .category_posts(&alice.id, "TRAVEL", 10)
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);

        let tagged = h.repos.posts.tagged_posts(&alice.id, "#beach", 10).await.unwrap();
        assert_eq!(tagged[0].id, post.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_publish_removes_uploaded_image() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;

        h.store.set_offline(true);
        let error = h
            .repos
            .posts
            .create_post(&alice, draft("", None))
            .await
            .unwrap_err();
        assert!(error.is_network());
        assert!(h.media.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn feed_contains_followed_and_own_posts_newest_first() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let carol = h.seed_user("carol-id", "carol", false).await;

        h.repos.users.follow(&alice, &bob.id).await.unwrap();
        let first = h.repos.posts.create_post(&bob, draft("one", None)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = h.repos.posts.create_post(&alice, draft("two", None)).await.unwrap();
        h.repos.posts.create_post(&carol, draft("hidden", None)).await.unwrap();

        let feed = h.repos.posts.feed(&alice.id, 10).await.unwrap();
        let ids: Vec<PostId> = feed.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        h.offline(true);
        let cached = h.repos.posts.feed(&alice.id, 10).await.unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].id, second.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn feed_offline_with_empty_cache_is_network_error() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        h.offline(true);
        assert!(h.repos.posts.feed(&alice.id, 10).await.unwrap_err().is_network());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn like_toggle_pairs_edge_and_counter() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let post = h.repos.posts.create_post(&alice, draft("hi", None)).await.unwrap();

        let liked = h.repos.posts.toggle_like(&bob, &post.id).await.unwrap();
        assert!(liked.is_liked);
        assert_eq!(liked.likes_count, 1);
        assert_eq!(h.store.count(collections::LIKES), 1);

        let inbox = h.repos.notifications.notifications(&alice.id, 10).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Like);
        assert_eq!(inbox[0].post_id, Some(post.id));

        let unliked = h.repos.posts.toggle_like(&bob, &post.id).await.unwrap();
        assert!(!unliked.is_liked);
        assert_eq!(unliked.likes_count, 0);
        assert_eq!(h.store.count(collections::LIKES), 0);

        let seen = h.repos.posts.get_post(&bob.id, &post.id).await.unwrap();
        assert_eq!(seen.likes_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bookmarks_round_trip() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let older = h.repos.posts.create_post(&alice, draft("a", None)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = h.repos.posts.create_post(&alice, draft("b", None)).await.unwrap();

        assert!(h.repos.posts.toggle_bookmark(&alice.id, &older.id).await.unwrap());
        assert!(h.repos.posts.toggle_bookmark(&alice.id, &newer.id).await.unwrap());

        let saved = h.repos.posts.bookmarked_posts(&alice.id, 10).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|post| post.is_bookmarked));

        assert!(!h.repos.posts.toggle_bookmark(&alice.id, &older.id).await.unwrap());
        let saved = h.repos.posts.bookmarked_posts(&alice.id, 10).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, newer.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_post_cascades() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let post = h
            .repos
            .posts
            .create_post(&alice, draft("bye", Some("food")))
            .await
            .unwrap();
        h.repos.posts.toggle_like(&bob, &post.id).await.unwrap();
        h.repos.posts.toggle_bookmark(&bob.id, &post.id).await.unwrap();
        h.repos
            .comments
            .add_comment(&bob, &post.id, "nice", None)
            .await
            .unwrap();

        let denied = h.repos.posts.delete_post(&bob.id, &post.id).await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));

        h.repos.posts.delete_post(&alice.id, &post.id).await.unwrap();
        assert_eq!(h.store.count(collections::POSTS), 0);
        assert_eq!(h.store.count(collections::LIKES), 0);
        assert_eq!(h.store.count(collections::BOOKMARKS), 0);
        assert_eq!(h.store.count(collections::COMMENTS), 0);
        assert_eq!(h.store.count(collections::NOTIFICATIONS), 0);
        assert!(h.media.is_empty());
        assert_eq!(h.repos.users.get_user(&alice.id).await.unwrap().posts_count, 0);
        assert!(h.repos.posts.trending_categories(10).await.unwrap().is_empty());
        assert!(matches!(
            h.repos.posts.get_post(&alice.id, &post.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trending_orders_by_likes() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let quiet = h.repos.posts.create_post(&alice, draft("quiet", None)).await.unwrap();
        let popular = h.repos.posts.create_post(&alice, draft("popular", None)).await.unwrap();
        h.repos.posts.toggle_like(&bob, &popular.id).await.unwrap();
        h.repos.posts.toggle_like(&alice, &popular.id).await.unwrap();

        let trending = h.repos.posts.trending_posts(&bob.id, 10).await.unwrap();
        assert_eq!(trending[0].id, popular.id);
        assert!(trending[0].is_liked);
        assert_eq!(trending[1].id, quiet.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn caption_edit_is_author_only() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let post = h.repos.posts.create_post(&alice, draft("old", None)).await.unwrap();

        let updated = h
            .repos
            .posts
            .update_caption(&alice.id, &post.id, "new #fresh")
            .await
            .unwrap();
        assert_eq!(updated.tags, vec!["fresh"]);
        assert!(h
            .repos
            .posts
            .update_caption(&bob.id, &post.id, "mine now")
            .await
            .is_err());
    }
}
