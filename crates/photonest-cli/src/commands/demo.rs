//! Scripted walkthrough against the in-memory backend.

use photonest_core::auth::{InMemoryAuthProvider, SessionHandle};
use photonest_core::db::LocalCache;
use photonest_core::models::{FollowStatus, User};
use photonest_core::remote::InMemoryDocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::InMemoryMediaStorage;
use photonest_core::viewmodel::{
    AuthEvent, AuthViewModel, CreatePostEvent, CreatePostViewModel, ExploreEvent,
    ExploreViewModel, FeedEvent, FeedViewModel, NotificationsEvent, NotificationsViewModel,
    PostDetailEvent, PostDetailViewModel, ProfileEvent, ProfileViewModel, SelectedImage,
};

use crate::commands::common::{format_category_line, format_comment_lines, format_post_lines, resolved};
use crate::error::CliError;

type MemoryRepositories =
    Repositories<InMemoryAuthProvider, InMemoryDocumentStore, InMemoryMediaStorage>;

/// 1x1 transparent PNG
const SAMPLE_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

pub async fn run_demo() -> Result<(), CliError> {
    for line in demo_transcript().await? {
        println!("{line}");
    }
    Ok(())
}

/// Run the walkthrough and return what it printed
pub async fn demo_transcript() -> Result<Vec<String>, CliError> {
    let repos: MemoryRepositories = Repositories::new(
        InMemoryAuthProvider::new(),
        InMemoryDocumentStore::new(),
        InMemoryMediaStorage::new(),
        LocalCache::open_in_memory().await?,
        SessionHandle::new(),
        None,
    );
    let mut out = Vec::new();

    let maya = sign_up(&repos, "maya@example.com", "maya", "Maya Lin").await?;
    let theo = sign_up(&repos, "theo@example.com", "theo", "Theo Park").await?;
    out.push(format!("Signed up @{} and @{}", maya.username, theo.username));

    let composer = CreatePostViewModel::new(repos.clone(), theo.clone());
    composer
        .on_event(CreatePostEvent::CaptionChanged(
            "Fog rolling over the bridge #sf #morning".to_string(),
        ))
        .await;
    composer
        .on_event(CreatePostEvent::CategoryChanged("Travel".to_string()))
        .await;
    composer
        .on_event(CreatePostEvent::ImageSelected(SelectedImage {
            bytes: SAMPLE_PNG.to_vec(),
            file_name: "bridge.png".to_string(),
            content_type: "image/png".to_string(),
        }))
        .await;
    composer.on_event(CreatePostEvent::Submit).await;
    let post = composer
        .state()
        .result
        .map(resolved)
        .transpose()?
        .ok_or_else(|| CliError::Screen("Post was not submitted".to_string()))?;
    out.push(format!("@{} posted {} with tags {:?}", theo.username, post.id, post.tags));

    let profile = ProfileViewModel::new(repos.clone(), maya.clone(), theo.id.clone());
    profile.on_event(ProfileEvent::Load).await;
    profile.on_event(ProfileEvent::ToggleFollow).await;
    if profile.state().follow_status == FollowStatus::Following {
        out.push(format!("@{} now follows @{}", maya.username, theo.username));
    }

    let feed = FeedViewModel::new(repos.clone(), maya.clone());
    feed.on_event(FeedEvent::Load).await;
    feed.on_event(FeedEvent::ToggleLike(post.id)).await;
    let posts = resolved(feed.state().posts)?;
    out.push(format!("Feed for @{}:", maya.username));
    out.extend(format_post_lines(&posts).into_iter().map(|line| format!("  {line}")));

    let detail = PostDetailViewModel::new(repos.clone(), maya.clone(), post.id);
    detail.on_event(PostDetailEvent::Load).await;
    detail
        .on_event(PostDetailEvent::CommentTextChanged("Worth the early alarm".to_string()))
        .await;
    detail.on_event(PostDetailEvent::SubmitComment).await;
    let threads = resolved(detail.state().comments)?;
    out.push("Comments:".to_string());
    out.extend(format_comment_lines(&threads).into_iter().map(|line| format!("  {line}")));

    let explore = ExploreViewModel::new(repos.clone(), maya.clone());
    explore.on_event(ExploreEvent::Load).await;
    out.push("Trending categories:".to_string());
    for category in resolved(explore.state().categories)? {
        out.push(format!("  {}", format_category_line(&category)));
    }

    let inbox = NotificationsViewModel::new(repos.clone(), theo.clone());
    inbox.on_event(NotificationsEvent::Load).await;
    let state = inbox.state();
    out.push(format!("@{} has {} unread notifications:", theo.username, state.unread));
    for notification in resolved(state.notifications)? {
        out.push(format!("  {}", notification.message));
    }

    Ok(out)
}

async fn sign_up(
    repos: &MemoryRepositories,
    email: &str,
    username: &str,
    full_name: &str,
) -> Result<User, CliError> {
    let vm = AuthViewModel::new(repos.clone());
    vm.on_event(AuthEvent::ToggleMode).await;
    vm.on_event(AuthEvent::EmailChanged(email.to_string())).await;
    vm.on_event(AuthEvent::PasswordChanged("demo-password".to_string()))
        .await;
    vm.on_event(AuthEvent::UsernameChanged(username.to_string()))
        .await;
    vm.on_event(AuthEvent::FullNameChanged(full_name.to_string()))
        .await;
    vm.on_event(AuthEvent::Submit).await;
    let state = vm.state();
    if let Some(alert) = state.alert {
        return Err(CliError::Screen(alert));
    }
    state.user.ok_or(CliError::NotSignedIn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn demo_runs_end_to_end() {
        let transcript = demo_transcript().await.unwrap();
        let text = transcript.join("\n");

        assert!(text.contains("Signed up @maya and @theo"));
        assert!(text.contains("@maya now follows @theo"));
        assert!(text.contains("Worth the early alarm"));
        assert!(text.contains("travel"));
        assert!(text.contains("maya liked your post"));
        assert!(text.contains("maya commented: Worth the early alarm"));
    }
}
