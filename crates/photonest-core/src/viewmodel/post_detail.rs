//! Single post with its comment threads

use super::{alert_for, StateHolder};
use crate::auth::AuthProvider;
use crate::models::{CommentId, CommentThread, Post, PostId, User};
use crate::remote::DocumentStore;
use crate::repository::Repositories;
use crate::resource::Resource;
use crate::storage::MediaStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDetailUiState {
    pub post: Resource<Post>,
    pub comments: Resource<Vec<CommentThread>>,
    pub comment_text: String,
    /// Comment the next submission replies to
    pub replying_to: Option<CommentId>,
    pub sending: bool,
    pub alert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostDetailEvent {
    Load,
    CommentTextChanged(String),
    ReplyTo(Option<CommentId>),
    SubmitComment,
    DeleteComment(CommentId),
    ToggleLike,
    DismissAlert,
}

pub struct PostDetailViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    viewer: User,
    post_id: PostId,
    state: StateHolder<PostDetailUiState>,
}

impl<A, D, M> PostDetailViewModel<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(repos: Repositories<A, D, M>, viewer: User, post_id: PostId) -> Self {
        Self {
            repos,
            viewer,
            post_id,
            state: StateHolder::default(),
        }
    }

    pub fn state(&self) -> PostDetailUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<PostDetailUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: PostDetailEvent) {
        match event {
            PostDetailEvent::Load => self.load().await,
            PostDetailEvent::CommentTextChanged(text) => {
                self.state.update(|state| state.comment_text = text);
            }
            PostDetailEvent::ReplyTo(parent) => self.state.update(|state| state.replying_to = parent),
            PostDetailEvent::SubmitComment => self.submit_comment().await,
            PostDetailEvent::DeleteComment(id) => self.delete_comment(id).await,
            PostDetailEvent::ToggleLike => self.toggle_like().await,
            PostDetailEvent::DismissAlert => self.state.update(|state| state.alert = None),
        }
    }

    async fn load(&self) {
        self.state.update(|state| {
            state.post = Resource::Loading;
            state.comments = Resource::Loading;
        });
        let post = self.repos.posts.get_post(&self.viewer.id, &self.post_id).await;
        let comments = self.repos.comments.comments(&self.post_id).await;
        self.state.update(|state| {
            state.post = post.into();
            state.comments = comments.into();
        });
    }

    async fn reload_comments(&self) {
        let comments = self.repos.comments.comments(&self.post_id).await;
        self.state.update(|state| {
            if let Ok(threads) = comments {
                state.comments = Resource::Success(threads);
            }
        });
    }

    async fn submit_comment(&self) {
        let current = self.state.get();
        if current.sending || current.comment_text.trim().is_empty() {
            return;
        }
        self.state.update(|state| state.sending = true);

        let result = self
            .repos
            .comments
            .add_comment(
                &self.viewer,
                &self.post_id,
                &current.comment_text,
                current.replying_to,
            )
            .await;
        let added = result.is_ok();
        self.state.update(|state| {
            state.sending = false;
            match result {
                Ok(_) => {
                    state.comment_text.clear();
                    state.replying_to = None;
                    if let Some(post) = state.post.data_mut() {
                        post.comments_count += 1;
                    }
                }
                Err(error) => state.alert = Some(alert_for("comment", &error)),
            }
        });
        if added {
            self.reload_comments().await;
        }
    }

    async fn delete_comment(&self, id: CommentId) {
        match self.repos.comments.delete_comment(&self.viewer.id, &id).await {
            Ok(removed) => {
                let removed = i64::try_from(removed).unwrap_or(0);
                self.state.update(|state| {
                    if let Some(post) = state.post.data_mut() {
                        post.comments_count = (post.comments_count - removed).max(0);
                    }
                });
                self.reload_comments().await;
            }
            Err(error) => {
                self.state
                    .update(|state| state.alert = Some(alert_for("delete comment", &error)));
            }
        }
    }

    async fn toggle_like(&self) {
        let mut previous = None;
        self.state.update(|state| {
            if let Some(post) = state.post.data_mut() {
                previous = Some(post.clone());
                post.apply_like_toggle();
            }
        });
        let Some(previous) = previous else {
            return;
        };

        let result = self.repos.posts.toggle_like(&self.viewer, &self.post_id).await;
        self.state.update(|state| match result {
            Ok(post) => state.post = Resource::Success(post),
            Err(error) => {
                state.post = Resource::Success(previous);
                state.alert = Some(alert_for("like", &error));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostDraft;
    use crate::repository::testing::Harness;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn comment_reply_and_delete() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let bob = h.seed_user("bob-id", "bob", false).await;
        let draft = PostDraft::new("view", None, vec![1], "v.jpg", "image/jpeg").unwrap();
        let post = h.repos.posts.create_post(&alice, draft).await.unwrap();

        let vm = PostDetailViewModel::new(h.repos.clone(), bob, post.id);
        vm.on_event(PostDetailEvent::Load).await;
        assert_eq!(vm.state().comments, Resource::Success(Vec::new()));

        // blank comments are ignored
        vm.on_event(PostDetailEvent::SubmitComment).await;
        assert_eq!(vm.state().post.data().unwrap().comments_count, 0);

        vm.on_event(PostDetailEvent::CommentTextChanged("Stunning".to_string()))
            .await;
        vm.on_event(PostDetailEvent::SubmitComment).await;
        let state = vm.state();
        assert!(state.comment_text.is_empty());
        let root = state.comments.data().unwrap()[0].comment.clone();

        vm.on_event(PostDetailEvent::ReplyTo(Some(root.id))).await;
        vm.on_event(PostDetailEvent::CommentTextChanged("thanks".to_string()))
            .await;
        vm.on_event(PostDetailEvent::SubmitComment).await;
        let state = vm.state();
        assert_eq!(state.replying_to, None);
        assert_eq!(state.comments.data().unwrap()[0].replies.len(), 1);
        assert_eq!(state.post.data().unwrap().comments_count, 2);

        vm.on_event(PostDetailEvent::DeleteComment(root.id)).await;
        let state = vm.state();
        assert!(state.comments.data().unwrap().is_empty());
        assert_eq!(state.post.data().unwrap().comments_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_comment_keeps_text_and_alerts() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        let draft = PostDraft::new("view", None, vec![1], "v.jpg", "image/jpeg").unwrap();
        let post = h.repos.posts.create_post(&alice, draft).await.unwrap();

        let vm = PostDetailViewModel::new(h.repos.clone(), alice, post.id);
        vm.on_event(PostDetailEvent::Load).await;
        h.offline(true);
        vm.on_event(PostDetailEvent::CommentTextChanged("hi".to_string()))
            .await;
        vm.on_event(PostDetailEvent::SubmitComment).await;

        let state = vm.state();
        assert_eq!(state.comment_text, "hi");
        assert!(!state.sending);
        assert!(state.alert.is_some());

        vm.on_event(PostDetailEvent::ToggleLike).await;
        assert!(!vm.state().post.data().unwrap().is_liked);
    }
}
