//! Profiles and the follow graph

use serde_json::{json, Value};

use super::{
    log_cache_write, non_empty, or_cached, query_in_chunks, NotificationRepository, PAGE_SIZE,
};
use crate::db::{LocalCache, UserDao};
use crate::error::{Error, Result};
use crate::models::{
    collections, fields, follow_document_id, validate_username, Follow, FollowStatus,
    NotificationKind, ProfileUpdate, User, UserId,
};
use crate::remote::{fetch, fetch_all, DocumentStore, FieldTransform, Fields, Query, Write};
use crate::storage::{MediaKind, MediaStorage};

const PROFILE_IMAGE_URL: &str = "profileImageUrl";

#[derive(Clone)]
pub struct UserRepository<D: DocumentStore, M: MediaStorage> {
    store: D,
    media: M,
    cache: LocalCache,
    notifications: NotificationRepository<D>,
}

impl<D: DocumentStore, M: MediaStorage> UserRepository<D, M> {
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

    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        match fetch::<User, D>(&self.store, collections::USERS, id.as_str()).await {
            Ok(Some(user)) => {
                self.cache_user(&user).await;
                Ok(user)
            }
            Ok(None) => {
                let db = self.cache.lock().await;
                log_cache_write("user", UserDao::new(db.connection()).delete(id).await);
                Err(Error::NotFound(format!("User {id} does not exist")))
            }
            Err(error) => {
                or_cached("user", error, async {
                    let db = self.cache.lock().await;
                    UserDao::new(db.connection()).get(id).await
                })
                .await
            }
        }
    }

    /// Apply profile edits, checking username uniqueness when it changes
    pub async fn update_profile(&self, viewer: &UserId, update: ProfileUpdate) -> Result<User> {
        let update = update.normalized()?;
        let mut user = fetch::<User, D>(&self.store, collections::USERS, viewer.as_str())
            .await?
            .ok_or_else(|| Error::NotFound("Your profile no longer exists".to_string()))?;
        if update.is_empty() {
            return Ok(user);
        }

        if let Some(username) = &update.username {
            if username != &user.username && !self.is_username_available(username).await? {
                return Err(Error::InvalidInput("That username is already taken".to_string()));
            }
        }

        update.apply_to(&mut user);
        let mut changed = Fields::new();
        changed.insert(fields::user::USERNAME.to_string(), json!(user.username));
        changed.insert("fullName".to_string(), json!(user.full_name));
        changed.insert("bio".to_string(), json!(user.bio));
        changed.insert("isPrivate".to_string(), json!(user.is_private));
        self.store
            .commit(vec![Write::update(collections::USERS, viewer.as_str(), changed)])
            .await?;

        tracing::info!("Updated profile for {}", viewer);
        self.cache_user(&user).await;
        Ok(user)
    }

    /// Replace the profile picture
    pub async fn upload_profile_image(
        &self,
        viewer: &UserId,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<User> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Please select an image".to_string()));
        }
        if !content_type.trim().starts_with("image/") {
            return Err(Error::InvalidInput("Only image files can be used".to_string()));
        }

        let key = self
            .media
            .build_media_key(MediaKind::ProfileImage, viewer.as_str(), file_name)?;
        let url = self.media.upload(&key, bytes, Some(content_type)).await?;

        let mut changed = Fields::new();
        changed.insert(PROFILE_IMAGE_URL.to_string(), json!(url));
        if let Err(error) = self
            .store
            .commit(vec![Write::update(collections::USERS, viewer.as_str(), changed)])
            .await
        {
            if let Err(cleanup) = self.media.delete(&key).await {
                tracing::warn!("Failed to remove orphaned profile image {}: {}", key, cleanup);
            }
            return Err(error);
        }

        self.get_user(viewer).await
    }

    /// Users whose handle starts with `prefix`
    pub async fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<User>> {
        let prefix = prefix.trim().trim_start_matches('@').to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::collection(collections::USERS)
            .where_prefix(fields::user::USERNAME, &prefix)
            .order_by(fields::user::USERNAME, crate::remote::Direction::Ascending)
            .limit(limit);
        match fetch_all::<User, D>(&self.store, &query).await {
            Ok(users) => {
                self.cache_users(&users).await;
                Ok(users)
            }
            Err(error) => {
                or_cached("user search", error, async {
                    let db = self.cache.lock().await;
                    UserDao::new(db.connection())
                        .search_by_username(&prefix, limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool> {
        let username = validate_username(username)?;
        let query = Query::collection(collections::USERS)
            .where_eq(fields::user::USERNAME, username)
            .limit(1);
        Ok(self.store.query(&query).await?.is_empty())
    }

    /// Follow `target`, or request to when the account is private
    pub async fn follow(&self, viewer: &User, target: &UserId) -> Result<FollowStatus> {
        if &viewer.id == target {
            return Err(Error::InvalidInput("You can't follow yourself".to_string()));
        }
        if let Some(edge) = self.edge(&viewer.id, target).await? {
            return Ok(FollowStatus::from_edge(Some(&edge)));
        }
        let target_user = fetch::<User, D>(&self.store, collections::USERS, target.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("User {target} does not exist")))?;

        let edge = Follow::new(viewer.id.clone(), target.clone(), !target_user.is_private);
        let mut writes = vec![Write::set(collections::FOLLOWS, edge.document_id(), &edge)?];
        if edge.accepted {
            writes.extend(counter_writes(&viewer.id, target, 1));
        }
        self.store.commit(writes).await?;

        let (kind, status) = if edge.accepted {
            self.adjust_cached_counts(&viewer.id, target, 1).await;
            (NotificationKind::Follow, FollowStatus::Following)
        } else {
            (NotificationKind::FollowRequest, FollowStatus::Requested)
        };
        self.notifications
            .notify_best_effort(target, viewer, kind, None, None)
            .await;
        Ok(status)
    }

    /// Remove a follow or withdraw a pending request
    pub async fn unfollow(&self, viewer: &UserId, target: &UserId) -> Result<()> {
        let Some(edge) = self.edge(viewer, target).await? else {
            return Ok(());
        };

        let mut writes = vec![Write::delete(collections::FOLLOWS, edge.document_id())];
        if edge.accepted {
            writes.extend(counter_writes(viewer, target, -1));
        }
        self.store.commit(writes).await?;
        if edge.accepted {
            self.adjust_cached_counts(viewer, target, -1).await;
        }
        Ok(())
    }

    /// Accept a pending request from `follower`
    pub async fn accept_request(&self, viewer: &User, follower: &UserId) -> Result<()> {
        let edge = self
            .edge(follower, &viewer.id)
            .await?
            .ok_or_else(|| Error::NotFound("That follow request no longer exists".to_string()))?;
        if edge.accepted {
            return Ok(());
        }

        let mut accepted = Fields::new();
        accepted.insert(fields::edge::ACCEPTED.to_string(), Value::Bool(true));
        let mut writes = vec![Write::update(
            collections::FOLLOWS,
            edge.document_id(),
            accepted,
        )];
        writes.extend(counter_writes(follower, &viewer.id, 1));
        self.store.commit(writes).await.map_err(|error| match error {
            Error::NotFound(_) => {
                Error::NotFound("That follow request no longer exists".to_string())
            }
            other => other,
        })?;

        self.adjust_cached_counts(follower, &viewer.id, 1).await;
        self.notifications
            .notify_best_effort(follower, viewer, NotificationKind::FollowAccepted, None, None)
            .await;
        Ok(())
    }

    pub async fn decline_request(&self, viewer: &UserId, follower: &UserId) -> Result<()> {
        match self.edge(follower, viewer).await? {
            Some(edge) if !edge.accepted => {
                self.store
                    .commit(vec![Write::delete(collections::FOLLOWS, edge.document_id())])
                    .await
            }
            _ => Ok(()),
        }
    }

    pub async fn followers(&self, user_id: &UserId) -> Result<Vec<User>> {
        let query = Query::collection(collections::FOLLOWS)
            .where_eq(fields::edge::FOLLOWEE_ID, user_id.as_str())
            .where_eq(fields::edge::ACCEPTED, true)
            .limit(PAGE_SIZE * 10);
        let remote = async {
            let edges = fetch_all::<Follow, D>(&self.store, &query).await?;
            let ids: Vec<UserId> = edges.into_iter().map(|edge| edge.follower_id).collect();
            self.users_by_ids(&ids).await
        };
        match remote.await {
            Ok(users) => Ok(users),
            Err(error) => {
                or_cached("followers", error, async {
                    self.cached_related(user_id, |user| user.followers).await
                })
                .await
            }
        }
    }

    pub async fn following(&self, user_id: &UserId) -> Result<Vec<User>> {
        let query = Query::collection(collections::FOLLOWS)
            .where_eq(fields::edge::FOLLOWER_ID, user_id.as_str())
            .where_eq(fields::edge::ACCEPTED, true)
            .limit(PAGE_SIZE * 10);
        let remote = async {
            let edges = fetch_all::<Follow, D>(&self.store, &query).await?;
            let ids: Vec<UserId> = edges.into_iter().map(|edge| edge.followee_id).collect();
            self.users_by_ids(&ids).await
        };
        match remote.await {
            Ok(users) => Ok(users),
            Err(error) => {
                or_cached("following", error, async {
                    self.cached_related(user_id, |user| user.following).await
                })
                .await
            }
        }
    }

    /// Accounts waiting for the viewer to accept them
    pub async fn pending_requests(&self, viewer: &UserId) -> Result<Vec<User>> {
        let query = Query::collection(collections::FOLLOWS)
            .where_eq(fields::edge::FOLLOWEE_ID, viewer.as_str())
            .where_eq(fields::edge::ACCEPTED, false)
            .limit(PAGE_SIZE);
        let edges = fetch_all::<Follow, D>(&self.store, &query).await?;
        let ids: Vec<UserId> = edges.into_iter().map(|edge| edge.follower_id).collect();
        self.users_by_ids(&ids).await
    }

    pub async fn follow_status(&self, viewer: &UserId, target: &UserId) -> Result<FollowStatus> {
        if viewer == target {
            return Ok(FollowStatus::NotFollowing);
        }
        match self.edge(viewer, target).await {
            Ok(edge) => Ok(FollowStatus::from_edge(edge.as_ref())),
            Err(error) => {
                or_cached("follow status", error, async {
                    let db = self.cache.lock().await;
                    let cached = UserDao::new(db.connection()).get(target).await?;
                    Ok(cached
                        .filter(|user| user.is_followed_by(viewer))
                        .map(|_| FollowStatus::Following))
                })
                .await
            }
        }
    }

    async fn edge(&self, follower: &UserId, followee: &UserId) -> Result<Option<Follow>> {
        fetch::<Follow, D>(
            &self.store,
            collections::FOLLOWS,
            &follow_document_id(follower, followee),
        )
        .await
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Value> = ids.iter().map(|id| json!(id.as_str())).collect();
        let mut users: Vec<User> = query_in_chunks(
            &self.store,
            || Query::collection(collections::USERS),
            "id",
            &values,
        )
        .await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        self.cache_users(&users).await;
        Ok(users)
    }

    async fn cached_related(
        &self,
        user_id: &UserId,
        related: impl FnOnce(User) -> Vec<UserId>,
    ) -> Result<Option<Vec<User>>> {
        let db = self.cache.lock().await;
        let dao = UserDao::new(db.connection());
        let Some(user) = dao.get(user_id).await? else {
            return Ok(None);
        };
        let mut users = Vec::new();
        for id in related(user) {
            if let Some(user) = dao.get(&id).await? {
                users.push(user);
            }
        }
        Ok(non_empty(users))
    }

    async fn cache_user(&self, user: &User) {
        let db = self.cache.lock().await;
        log_cache_write("user", UserDao::new(db.connection()).upsert(user).await);
    }

    async fn cache_users(&self, users: &[User]) {
        let db = self.cache.lock().await;
        log_cache_write("users", UserDao::new(db.connection()).upsert_many(users).await);
    }

    async fn adjust_cached_counts(&self, follower: &UserId, followee: &UserId, delta: i64) {
        let db = self.cache.lock().await;
        let dao = UserDao::new(db.connection());
        log_cache_write("follower count", dao.adjust_counts(followee, delta, 0, 0).await);
        log_cache_write("following count", dao.adjust_counts(follower, 0, delta, 0).await);
    }
}

/// Counter and relation-list updates for an accepted edge appearing (+1) or going away (-1)
pub(super) fn counter_writes(follower: &UserId, followee: &UserId, delta: i64) -> Vec<Write> {
    let list_change = |id: &UserId| {
        let values = vec![json!(id.as_str())];
        if delta > 0 {
            FieldTransform::ArrayUnion(values)
        } else {
            FieldTransform::ArrayRemove(values)
        }
    };
    vec![
        Write::transform(
            collections::USERS,
            followee.as_str(),
            vec![
                (
                    fields::user::FOLLOWERS_COUNT.to_string(),
                    FieldTransform::Increment(delta),
                ),
                (fields::user::FOLLOWERS.to_string(), list_change(follower)),
            ],
        ),
        Write::transform(
            collections::USERS,
            follower.as_str(),
            vec![
                (
                    fields::user::FOLLOWING_COUNT.to_string(),
                    FieldTransform::Increment(delta),
                ),
                (fields::user::FOLLOWING.to_string(), list_change(followee)),
            ],
        ),
    ]
}
