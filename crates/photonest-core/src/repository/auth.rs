//! Sign-up, sign-in and the signed-in user's account

use super::user::counter_writes;
use super::{delete_matching, log_cache_write, or_cached, PostRepository};
use crate::auth::{AuthProvider, AuthSession, SessionHandle};
use crate::db::{LocalCache, UserDao};
use crate::error::{Error, Result};
use crate::models::{collections, fields, validate_username, Follow, Like, User, UserId};
use crate::otp::{OtpClient, OtpError};
use crate::remote::{fetch, fetch_all, DocumentStore, Query, Write};
use crate::storage::MediaStorage;

/// Everything needed to register an account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: String,
}

#[derive(Clone)]
pub struct AuthRepository<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    auth: A,
    store: D,
    cache: LocalCache,
    session: SessionHandle,
    otp: Option<OtpClient>,
    posts: PostRepository<D, M>,
}

impl<A, D, M> AuthRepository<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub const fn new(
        auth: A,
        store: D,
        cache: LocalCache,
        session: SessionHandle,
        otp: Option<OtpClient>,
        posts: PostRepository<D, M>,
    ) -> Self {
        Self {
            auth,
            store,
            cache,
            session,
            otp,
            posts,
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session.current()
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool> {
        let username = validate_username(username)?;
        let query = Query::collection(collections::USERS)
            .where_eq(fields::user::USERNAME, username)
            .limit(1);
        Ok(self.store.query(&query).await?.is_empty())
    }

    /// Create the account and its profile document
    ///
    /// When the profile cannot be written the fresh account is deleted again,
    /// so a retry with the same email works.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User> {
        let username = validate_username(&request.username)?;
        if !self.is_username_available(&username).await? {
            return Err(Error::InvalidInput("That username is already taken".to_string()));
        }

        let session = self.auth.sign_up(&request.email, &request.password).await?;
        self.session.set(Some(session.clone()));

        let email = session
            .user
            .email
            .clone()
            .unwrap_or_else(|| request.email.trim().to_lowercase());
        let user = User::new(
            UserId::new(session.user.id.clone()),
            &username,
            &email,
            &request.full_name,
        );
        let written = match Write::set(collections::USERS, user.id.as_str(), &user) {
            Ok(write) => self.store.commit(vec![write]).await,
            Err(error) => Err(error),
        };
        if let Err(error) = written {
            tracing::warn!("Profile for new account {} not saved: {}", user.id, error);
            if let Err(rollback) = self.auth.delete_account(&session).await {
                tracing::warn!("Failed to roll back account {}: {}", user.id, rollback);
            }
            self.session.set(None);
            return Err(error);
        }

        tracing::info!("Registered {} as @{}", user.id, user.username);
        self.cache_user(&user).await;
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let session = self.auth.sign_in(email, password).await?;
        let user_id = UserId::new(session.user.id.clone());
        self.session.set(Some(session));

        match self.load_user(&user_id).await {
            Ok(user) => Ok(user),
            Err(error @ Error::NotFound(_)) => {
                self.session.set(None);
                if let Err(sign_out) = self.auth.sign_out().await {
                    tracing::warn!("Failed to drop session without profile: {}", sign_out);
                }
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Forget the session and everything cached for it
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(error) = self.auth.sign_out().await {
            tracing::warn!("Auth sign-out failed: {}", error);
        }
        self.session.set(None);
        self.cache.clear_all().await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Pick up a persisted session, if any, and load its profile
    pub async fn restore_session(&self) -> Result<Option<User>> {
        let Some(session) = self.auth.restore_session().await? else {
            self.session.set(None);
            return Ok(None);
        };
        let user_id = UserId::new(session.user.id.clone());
        self.session.set(Some(session));
        self.load_user(&user_id).await.map(Some)
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        match self.session.user_id() {
            Some(id) => self.load_user(&UserId::new(id)).await.map(Some),
            None => Ok(None),
        }
    }

    /// The signed-in user, or [`Error::Unauthenticated`]
    pub async fn require_user(&self) -> Result<User> {
        self.current_user().await?.ok_or(Error::Unauthenticated)
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.auth.send_password_reset(email).await?;
        Ok(())
    }

    /// Remove the signed-in account with its posts, follows and likes
    ///
    /// Data cleanup is best effort; only the final account deletion can fail
    /// the call.
    pub async fn delete_account(&self) -> Result<()> {
        let session = self.session.current().ok_or(Error::Unauthenticated)?;
        let user_id = UserId::new(session.user.id.clone());
        tracing::info!("Deleting account {}", user_id);

        self.posts.delete_all_by(&user_id).await;
        self.drop_follow_edges(&user_id).await;
        self.drop_likes(&user_id).await;
        for (collection, field) in [
            (collections::BOOKMARKS, fields::edge::USER_ID),
            (collections::COMMENTS, fields::edge::USER_ID),
            (collections::NOTIFICATIONS, fields::notification::RECIPIENT_ID),
            (collections::NOTIFICATIONS, fields::notification::ACTOR_ID),
        ] {
            delete_matching(
                &self.store,
                Query::collection(collection).where_eq(field, user_id.as_str()),
            )
            .await;
        }
        if let Err(error) = self
            .store
            .commit(vec![Write::delete(collections::USERS, user_id.as_str())])
            .await
        {
            tracing::warn!("Failed to delete profile {}: {}", user_id, error);
        }

        self.auth.delete_account(&session).await?;
        self.session.set(None);
        log_cache_write("account", self.cache.clear_all().await);
        Ok(())
    }

    async fn drop_follow_edges(&self, user_id: &UserId) {
        for field in [fields::edge::FOLLOWER_ID, fields::edge::FOLLOWEE_ID] {
            let query = Query::collection(collections::FOLLOWS).where_eq(field, user_id.as_str());
            let edges = match fetch_all::<Follow, D>(&self.store, &query).await {
                Ok(edges) => edges,
                Err(error) => {
                    tracing::warn!("Failed to list follows of {}: {}", user_id, error);
                    continue;
                }
            };
            for edge in edges {
                let mut writes = vec![Write::delete(collections::FOLLOWS, edge.document_id())];
                if edge.accepted {
                    writes.extend(
                        counter_writes(&edge.follower_id, &edge.followee_id, -1)
                            .into_iter()
                            .filter(|write| write.id() != user_id.as_str()),
                    );
                }
                if let Err(error) = self.store.commit(writes).await {
                    tracing::warn!("Failed to remove follow {}: {}", edge.document_id(), error);
                }
            }
        }
    }

    async fn drop_likes(&self, user_id: &UserId) {
        let query =
            Query::collection(collections::LIKES).where_eq(fields::edge::USER_ID, user_id.as_str());
        let likes = match fetch_all::<Like, D>(&self.store, &query).await {
            Ok(likes) => likes,
            Err(error) => {
                tracing::warn!("Failed to list likes of {}: {}", user_id, error);
                return;
            }
        };
        for like in likes {
            let writes = vec![
                Write::delete(
                    collections::LIKES,
                    crate::models::like_document_id(&like.post_id, user_id),
                ),
                Write::increment(
                    collections::POSTS,
                    like.post_id.as_str(),
                    crate::models::fields::post::LIKES_COUNT,
                    -1,
                ),
            ];
            if let Err(error) = self.store.commit(writes).await {
                tracing::warn!("Failed to remove like on {}: {}", like.post_id, error);
            }
        }
    }

    /// Whether sign-up has to go through an emailed code first
    pub const fn otp_enabled(&self) -> bool {
        self.otp.is_some()
    }

    /// Email a one-time code to `email`
    pub async fn send_otp(&self, email: &str) -> Result<String> {
        Ok(self.otp_client()?.send_otp(email).await?)
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<String> {
        Ok(self.otp_client()?.verify_otp(email, code).await?)
    }

    fn otp_client(&self) -> Result<&OtpClient> {
        self.otp.as_ref().ok_or(Error::Otp(OtpError::InvalidConfiguration(
            "no OTP service URL is configured",
        )))
    }

    /// Profile by id: remote first, cached copy when the remote is unreachable
    async fn load_user(&self, id: &UserId) -> Result<User> {
        match fetch::<User, D>(&self.store, collections::USERS, id.as_str()).await {
            Ok(Some(user)) => {
                self.cache_user(&user).await;
                Ok(user)
            }
            Ok(None) => Err(Error::NotFound(
                "No profile exists for this account".to_string(),
            )),
            Err(error) => {
                or_cached("profile", error, async {
                    let db = self.cache.lock().await;
                    UserDao::new(db.connection()).get(id).await
                })
                .await
            }
        }
    }

    async fn cache_user(&self, user: &User) {
        let db = self.cache.lock().await;
        log_cache_write("profile", UserDao::new(db.connection()).upsert(user).await);
    }
}
