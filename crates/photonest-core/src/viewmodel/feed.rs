//! Home feed screen

use super::{alert_for, find_post, StateHolder};
use crate::auth::AuthProvider;
use crate::models::{Post, PostId, User};
use crate::remote::DocumentStore;
use crate::repository::{Repositories, PAGE_SIZE};
use crate::resource::Resource;
use crate::storage::MediaStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedUiState {
    pub posts: Resource<Vec<Post>>,
    /// A pull-to-refresh is running over already loaded posts
    pub refreshing: bool,
    pub alert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Load,
    Refresh,
    ToggleLike(PostId),
    ToggleBookmark(PostId),
    DeletePost(PostId),
    DismissAlert,
}

pub struct FeedViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    viewer: User,
    state: StateHolder<FeedUiState>,
}

impl<A, D, M> FeedViewModel<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(repos: Repositories<A, D, M>, viewer: User) -> Self {
        Self {
            repos,
            viewer,
            state: StateHolder::default(),
        }
    }

    pub fn state(&self) -> FeedUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<FeedUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Load => self.load(false).await,
            FeedEvent::Refresh => self.load(true).await,
            FeedEvent::ToggleLike(id) => self.toggle_like(id).await,
            FeedEvent::ToggleBookmark(id) => self.toggle_bookmark(id).await,
            FeedEvent::DeletePost(id) => self.delete_post(id).await,
            FeedEvent::DismissAlert => self.state.update(|state| state.alert = None),
        }
    }

    async fn load(&self, refresh: bool) {
        self.state.update(|state| {
            if refresh && state.posts.is_success() {
                state.refreshing = true;
            } else {
                state.posts = Resource::Loading;
            }
        });

        let result = self.repos.posts.feed(&self.viewer.id, PAGE_SIZE).await;
        self.state.update(|state| {
            state.refreshing = false;
            match result {
                Ok(posts) => state.posts = Resource::Success(posts),
                // keep what is on screen when a refresh fails
                Err(error) if refresh && state.posts.is_success() => {
                    state.alert = Some(alert_for("feed refresh", &error));
                }
                Err(error) => state.posts = Resource::from_error(&error),
            }
        });
    }

    async fn toggle_like(&self, id: PostId) {
        let mut previous = None;
        self.state.update(|state| {
            if let Some(post) = state.posts.data_mut().and_then(|posts| find_post(posts, &id)) {
                previous = Some(post.clone());
                post.apply_like_toggle();
            }
        });
        let Some(previous) = previous else {
            return;
        };

        let result = self.repos.posts.toggle_like(&self.viewer, &id).await;
        self.state.update(|state| {
            let Some(post) = state.posts.data_mut().and_then(|posts| find_post(posts, &id)) else {
                return;
            };
            match result {
                Ok(updated) => *post = updated,
                Err(error) => {
                    *post = previous;
                    state.alert = Some(alert_for("like", &error));
                }
            }
        });
    }

    async fn toggle_bookmark(&self, id: PostId) {
        let mut previous = None;
        self.state.update(|state| {
            if let Some(post) = state.posts.data_mut().and_then(|posts| find_post(posts, &id)) {
                previous = Some(post.is_bookmarked);
                post.is_bookmarked = !post.is_bookmarked;
            }
        });
        let Some(previous) = previous else {
            return;
        };

        let result = self.repos.posts.toggle_bookmark(&self.viewer.id, &id).await;
        self.state.update(|state| {
            let Some(post) = state.posts.data_mut().and_then(|posts| find_post(posts, &id)) else {
                return;
            };
            match result {
                Ok(bookmarked) => post.is_bookmarked = bookmarked,
                Err(error) => {
                    post.is_bookmarked = previous;
                    state.alert = Some(alert_for("bookmark", &error));
                }
            }
        });
    }

    async fn delete_post(&self, id: PostId) {
        let result = self.repos.posts.delete_post(&self.viewer.id, &id).await;
        self.state.update(|state| match result {
            Ok(()) => {
                if let Some(posts) = state.posts.data_mut() {
                    posts.retain(|post| post.id != id);
                }
            }
            Err(error) => state.alert = Some(alert_for("delete post", &error)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostDraft;
    use crate::repository::testing::Harness;
    use pretty_assertions::assert_eq;

    async fn setup() -> (Harness, User, Post) {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let draft = PostDraft::new("hello #world", None, vec![1, 2], "a.jpg", "image/jpeg").unwrap();
        let post = h.repos.posts.create_post(&alice, draft).await.unwrap();
        (h, alice, post)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_then_like_and_bookmark() {
        let (h, alice, post) = setup().await;
        let vm = FeedViewModel::new(h.repos.clone(), alice);

        assert!(vm.state().posts.is_loading());
        vm.on_event(FeedEvent::Load).await;
        assert_eq!(vm.state().posts.data().map(Vec::len), Some(1));

        vm.on_event(FeedEvent::ToggleLike(post.id)).await;
        let liked = vm.state().posts.into_data().unwrap().remove(0);
        assert!(liked.is_liked);
        assert_eq!(liked.likes_count, 1);

        vm.on_event(FeedEvent::ToggleBookmark(post.id)).await;
        assert!(vm.state().posts.data().unwrap()[0].is_bookmarked);
        assert!(vm.state().alert.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_like_rolls_back_and_alerts() {
        let (h, alice, post) = setup().await;
        let vm = FeedViewModel::new(h.repos.clone(), alice);
        vm.on_event(FeedEvent::Load).await;

        h.offline(true);
        let rx = vm.subscribe();
        vm.on_event(FeedEvent::ToggleLike(post.id)).await;

        let state = vm.state();
        let shown = &state.posts.data().unwrap()[0];
        assert!(!shown.is_liked);
        assert_eq!(shown.likes_count, 0);
        assert!(state.alert.is_some());
        assert!(rx.has_changed().unwrap());

        vm.on_event(FeedEvent::DismissAlert).await;
        assert!(vm.state().alert.is_none());

        vm.on_event(FeedEvent::ToggleBookmark(post.id)).await;
        assert!(!vm.state().posts.data().unwrap()[0].is_bookmarked);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_failure_keeps_posts() {
        let (h, alice, _) = setup().await;
        let vm = FeedViewModel::new(h.repos.clone(), alice);
        vm.on_event(FeedEvent::Load).await;

        h.offline(true);
        h.cache.clear_all().await.unwrap();
        vm.on_event(FeedEvent::Refresh).await;
        let state = vm.state();
        assert!(state.posts.is_success());
        assert!(!state.refreshing);
        assert!(state.alert.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_first_load_is_error() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        h.offline(true);
        let vm = FeedViewModel::new(h.repos.clone(), alice);
        vm.on_event(FeedEvent::Load).await;
        assert_eq!(
            vm.state().posts.error_message(),
            Some("No internet connection. Please try again.")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_removes_post() {
        let (h, alice, post) = setup().await;
        let vm = FeedViewModel::new(h.repos.clone(), alice);
        vm.on_event(FeedEvent::Load).await;
        vm.on_event(FeedEvent::DeletePost(post.id)).await;
        assert_eq!(vm.state().posts.data().map(Vec::len), Some(0));
    }
}
