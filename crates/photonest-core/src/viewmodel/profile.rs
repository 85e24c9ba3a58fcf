//! Profile screen: a user, their posts, follow button and profile editing

use super::{alert_for, StateHolder};
use crate::auth::AuthProvider;
use crate::models::{FollowStatus, Post, ProfileUpdate, User, UserId};
use crate::remote::DocumentStore;
use crate::repository::{Repositories, PAGE_SIZE};
use crate::resource::Resource;
use crate::storage::MediaStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUiState {
    pub user: Resource<User>,
    pub posts: Resource<Vec<Post>>,
    /// Only loaded on the viewer's own profile
    pub bookmarks: Option<Resource<Vec<Post>>>,
    pub follow_status: FollowStatus,
    pub is_self: bool,
    /// Private account the viewer does not follow; posts stay hidden
    pub is_locked: bool,
    pub saving: bool,
    pub alert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    Load,
    ToggleFollow,
    LoadBookmarks,
    SaveProfile(ProfileUpdate),
    ChangePhoto {
        bytes: Vec<u8>,
        file_name: String,
        content_type: String,
    },
    DismissAlert,
}

pub struct ProfileViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    viewer: User,
    user_id: UserId,
    state: StateHolder<ProfileUiState>,
}

impl<A, D, M> ProfileViewModel<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(repos: Repositories<A, D, M>, viewer: User, user_id: UserId) -> Self {
        let is_self = viewer.id == user_id;
        Self {
            repos,
            viewer,
            user_id,
            state: StateHolder::new(ProfileUiState {
                is_self,
                ..ProfileUiState::default()
            }),
        }
    }

    pub fn state(&self) -> ProfileUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<ProfileUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: ProfileEvent) {
        match event {
            ProfileEvent::Load => self.load().await,
            ProfileEvent::ToggleFollow => self.toggle_follow().await,
            ProfileEvent::LoadBookmarks => self.load_bookmarks().await,
            ProfileEvent::SaveProfile(update) => self.save_profile(update).await,
            ProfileEvent::ChangePhoto {
                bytes,
                file_name,
                content_type,
            } => self.change_photo(bytes, &file_name, &content_type).await,
            ProfileEvent::DismissAlert => self.state.update(|state| state.alert = None),
        }
    }

    fn is_self(&self) -> bool {
        self.viewer.id == self.user_id
    }

    async fn load(&self) {
        self.state.update(|state| {
            state.user = Resource::Loading;
            state.posts = Resource::Loading;
        });

        let user = match self.repos.users.get_user(&self.user_id).await {
            Ok(user) => user,
            Err(error) => {
                self.state.update(|state| {
                    state.user = Resource::from_error(&error);
                    state.posts = Resource::from_error(&error);
                });
                return;
            }
        };

        let status = if self.is_self() {
            FollowStatus::NotFollowing
        } else {
            self.repos
                .users
                .follow_status(&self.viewer.id, &self.user_id)
                .await
                .unwrap_or_default()
        };
        let is_locked =
            user.is_private && !self.is_self() && status != FollowStatus::Following;
        let posts = if is_locked {
            Resource::Success(Vec::new())
        } else {
            self.repos
                .posts
                .user_posts(&self.viewer.id, &self.user_id, PAGE_SIZE)
                .await
                .into()
        };

        self.state.update(|state| {
            state.user = Resource::Success(user);
            state.posts = posts;
            state.follow_status = status;
            state.is_locked = is_locked;
        });
    }

    async fn load_bookmarks(&self) {
        if !self.is_self() {
            return;
        }
        self.state.update(|state| state.bookmarks = Some(Resource::Loading));
        let result = self
            .repos
            .posts
            .bookmarked_posts(&self.viewer.id, PAGE_SIZE)
            .await;
        self.state.update(|state| state.bookmarks = Some(result.into()));
    }

    /// Follow, request, unfollow or withdraw, shown immediately and undone on failure
    async fn toggle_follow(&self) {
        if self.is_self() {
            return;
        }
        let before = self.state.get();
        let Some(target) = before.user.data() else {
            return;
        };
        let previous_status = before.follow_status;

        let (optimistic, delta) = match previous_status {
            FollowStatus::NotFollowing if target.is_private => (FollowStatus::Requested, 0),
            FollowStatus::NotFollowing => (FollowStatus::Following, 1),
            FollowStatus::Following => (FollowStatus::NotFollowing, -1),
            FollowStatus::Requested => (FollowStatus::NotFollowing, 0),
        };
        self.state.update(|state| {
            state.follow_status = optimistic;
            if let Some(user) = state.user.data_mut() {
                user.followers_count = (user.followers_count + delta).max(0);
            }
        });

        let result = if previous_status == FollowStatus::NotFollowing {
            self.repos.users.follow(&self.viewer, &self.user_id).await
        } else {
            self.repos
                .users
                .unfollow(&self.viewer.id, &self.user_id)
                .await
                .map(|()| FollowStatus::NotFollowing)
        };

        match result {
            Ok(status) => {
                self.state.update(|state| state.follow_status = status);
                if status == FollowStatus::Following || previous_status == FollowStatus::Following
                {
                    // unlocks or re-locks a private account's posts
                    self.load().await;
                }
            }
            Err(error) => self.state.update(|state| {
                state.follow_status = previous_status;
                if let Some(user) = state.user.data_mut() {
                    user.followers_count = (user.followers_count - delta).max(0);
                }
                state.alert = Some(alert_for("follow", &error));
            }),
        }
    }

    async fn save_profile(&self, update: ProfileUpdate) {
        if !self.is_self() {
            return;
        }
        self.state.update(|state| state.saving = true);
        let result = self.repos.users.update_profile(&self.viewer.id, update).await;
        self.state.update(|state| {
            state.saving = false;
            match result {
                Ok(user) => state.user = Resource::Success(user),
                Err(error) => state.alert = Some(alert_for("save profile", &error)),
            }
        });
    }

    async fn change_photo(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) {
        if !self.is_self() {
            return;
        }
        self.state.update(|state| state.saving = true);
        let result = self
            .repos
            .users
            .upload_profile_image(&self.viewer.id, bytes, file_name, content_type)
            .await;
        self.state.update(|state| {
            state.saving = false;
            match result {
                Ok(user) => state.user = Resource::Success(user),
                Err(error) => state.alert = Some(alert_for("profile photo", &error)),
            }
        });
    }
}
