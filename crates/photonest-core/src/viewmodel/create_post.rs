//! New post composer

use super::{alert_for, StateHolder};
use crate::auth::AuthProvider;
use crate::error::Error;
use crate::models::{extract_tags, validate_caption, Post, PostDraft, User};
use crate::remote::DocumentStore;
use crate::repository::Repositories;
use crate::resource::Resource;
use crate::storage::MediaStorage;

/// Image picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatePostUiState {
    pub caption: String,
    pub category: String,
    pub image: Option<SelectedImage>,
    /// Hashtags found in the caption so far
    pub tags: Vec<String>,
    pub caption_error: Option<String>,
    pub image_error: Option<String>,
    /// `None` until the first submit
    pub result: Option<Resource<Post>>,
    pub alert: Option<String>,
}

impl CreatePostUiState {
    pub fn is_submitting(&self) -> bool {
        self.result.as_ref().is_some_and(Resource::is_loading)
    }

    pub fn can_submit(&self) -> bool {
        self.image.is_some() && self.caption_error.is_none() && !self.is_submitting()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatePostEvent {
    CaptionChanged(String),
    CategoryChanged(String),
    ImageSelected(SelectedImage),
    ClearImage,
    Submit,
    /// Clear the form after a successful post
    Reset,
    DismissAlert,
}

pub struct CreatePostViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    author: User,
    state: StateHolder<CreatePostUiState>,
}

impl<A, D, M> CreatePostViewModel<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(repos: Repositories<A, D, M>, author: User) -> Self {
        Self {
            repos,
            author,
            state: StateHolder::default(),
        }
    }

    pub fn state(&self) -> CreatePostUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<CreatePostUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: CreatePostEvent) {
        match event {
            CreatePostEvent::CaptionChanged(caption) => self.state.update(|state| {
                state.tags = extract_tags(&caption);
                state.caption_error = validate_caption(&caption).err().map(|e| e.user_message());
                state.caption = caption;
            }),
            CreatePostEvent::CategoryChanged(category) => {
                self.state.update(|state| state.category = category);
            }
            CreatePostEvent::ImageSelected(image) => self.state.update(|state| {
                state.image_error = image_problem(&image);
                state.image = Some(image);
            }),
            CreatePostEvent::ClearImage => self.state.update(|state| {
                state.image = None;
                state.image_error = None;
            }),
            CreatePostEvent::Submit => self.submit().await,
            CreatePostEvent::Reset => self.state.set(CreatePostUiState::default()),
            CreatePostEvent::DismissAlert => self.state.update(|state| state.alert = None),
        }
    }

    async fn submit(&self) {
        let current = self.state.get();
        if current.is_submitting() {
            return;
        }
        let Some(image) = current.image else {
            self.state.update(|state| {
                state.image_error = Some("Please select an image".to_string());
            });
            return;
        };
        let category = Some(current.category.as_str()).filter(|c| !c.trim().is_empty());
        let draft = match PostDraft::new(
            &current.caption,
            category,
            image.bytes,
            &image.file_name,
            &image.content_type,
        ) {
            Ok(draft) => draft,
            Err(error) => {
                self.state.update(|state| apply_validation_error(state, &error));
                return;
            }
        };

        self.state.update(|state| state.result = Some(Resource::Loading));
        let result = self.repos.posts.create_post(&self.author, draft).await;
        self.state.update(|state| match result {
            Ok(post) => state.result = Some(Resource::Success(post)),
            Err(error) => {
                state.alert = Some(alert_for("create post", &error));
                state.result = Some(Resource::from_error(&error));
            }
        });
    }
}

fn image_problem(image: &SelectedImage) -> Option<String> {
    if image.bytes.is_empty() {
        Some("Please select an image".to_string())
    } else if !image.content_type.trim().to_ascii_lowercase().starts_with("image/") {
        Some("Only image files can be posted".to_string())
    } else {
        None
    }
}

fn apply_validation_error(state: &mut CreatePostUiState, error: &Error) {
    let message = error.user_message();
    if message.to_lowercase().contains("image") {
        state.image_error = Some(message);
    } else {
        state.caption_error = Some(message);
    }
}
