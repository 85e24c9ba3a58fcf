//! Screen state machines.
//!
//! Each screen owns one [`StateHolder`] with its `UiState` and handles an
//! `Event` enum in `on_event`. State is replaced atomically on every update
//! and every subscriber observes the new value. Errors never escape
//! `on_event`: they land in a [`Resource::Error`](crate::Resource) or in the
//! screen's dismissible `alert`.

mod auth;
mod create_post;
mod explore;
mod feed;
mod notifications;
mod post_detail;
mod profile;

use tokio::sync::watch;

pub use auth::{AuthEvent, AuthMode, AuthUiState, AuthViewModel, FieldErrors};
pub use create_post::{CreatePostEvent, CreatePostUiState, CreatePostViewModel, SelectedImage};
pub use explore::{ExploreEvent, ExploreUiState, ExploreViewModel};
pub use feed::{FeedEvent, FeedUiState, FeedViewModel};
pub use notifications::{NotificationsEvent, NotificationsUiState, NotificationsViewModel};
pub use post_detail::{PostDetailEvent, PostDetailUiState, PostDetailViewModel};
pub use profile::{ProfileEvent, ProfileUiState, ProfileViewModel};

use crate::error::Error;
use crate::models::{Post, PostId};

/// Current state of one screen, observable through `watch` receivers
#[derive(Debug)]
pub struct StateHolder<S> {
    tx: watch::Sender<S>,
}

impl<S: Clone> StateHolder<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current state
    pub fn get(&self) -> S {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    /// Apply `change` and notify subscribers
    pub fn update(&self, change: impl FnOnce(&mut S)) {
        self.tx.send_modify(change);
    }

    pub fn set(&self, state: S) {
        self.tx.send_replace(state);
    }
}

impl<S: Clone + Default> Default for StateHolder<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

/// Alert text for a failed action
pub(crate) fn alert_for(action: &str, error: &Error) -> String {
    tracing::debug!("{} failed: {}", action, error);
    error.user_message()
}

/// Find a post in a loaded list
pub(crate) fn find_post<'a>(posts: &'a mut [Post], id: &PostId) -> Option<&'a mut Post> {
    posts.iter_mut().find(|post| &post.id == id)
}
