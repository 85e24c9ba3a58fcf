use std::path::Path;

use photonest_core::auth::AuthProvider;
use photonest_core::models::{CommentId, CommentThread, PostId, User};
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;
use photonest_core::viewmodel::{
    CreatePostEvent, CreatePostViewModel, FeedEvent, FeedViewModel, PostDetailEvent,
    PostDetailViewModel, SelectedImage,
};

use crate::cli::PostCommands;
use crate::commands::common::{
    content_type_for, format_comment_lines, format_post_lines, parse_id, post_to_list_item,
    print_json, print_posts, resolved, signed_in_user,
};
use crate::error::CliError;

pub async fn run_feed<A, D, M>(
    repos: &Repositories<A, D, M>,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let viewer = signed_in_user(repos).await?;
    let vm = FeedViewModel::new(repos.clone(), viewer);
    vm.on_event(FeedEvent::Load).await;
    let mut posts = resolved(vm.state().posts)?;
    posts.truncate(limit);
    print_posts(&posts, as_json)
}

pub async fn run_post<A, D, M>(
    repos: &Repositories<A, D, M>,
    command: PostCommands,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let viewer = signed_in_user(repos).await?;
    match command {
        PostCommands::Create {
            image,
            caption,
            category,
        } => create(repos, viewer, &image, caption, category).await,
        PostCommands::Show { id } => show(repos, viewer, &id, as_json).await,
        PostCommands::Delete { id } => {
            let post_id: PostId = parse_id("post", &id)?;
            repos.posts.delete_post(&viewer.id, &post_id).await?;
            println!("Deleted {post_id}");
            Ok(())
        }
        PostCommands::Like { id } => {
            let post_id: PostId = parse_id("post", &id)?;
            let post = repos.posts.toggle_like(&viewer, &post_id).await?;
            let verb = if post.is_liked { "Liked" } else { "Unliked" };
            println!("{verb} {post_id} ({} likes)", post.likes_count);
            Ok(())
        }
        PostCommands::Bookmark { id } => {
            let post_id: PostId = parse_id("post", &id)?;
            let saved = repos.posts.toggle_bookmark(&viewer.id, &post_id).await?;
            let verb = if saved { "Bookmarked" } else { "Removed bookmark from" };
            println!("{verb} {post_id}");
            Ok(())
        }
        PostCommands::Comment { id, text, reply_to } => {
            let post_id: PostId = parse_id("post", &id)?;
            let parent = reply_to
                .as_deref()
                .map(|raw| parse_id::<CommentId>("comment", raw))
                .transpose()?;
            let text = text.join(" ");
            if text.trim().is_empty() {
                return Err(CliError::EmptyComment);
            }
            let comment = repos
                .comments
                .add_comment(&viewer, &post_id, &text, parent)
                .await?;
            println!("{}", comment.id);
            Ok(())
        }
    }
}

async fn create<A, D, M>(
    repos: &Repositories<A, D, M>,
    viewer: User,
    image: &Path,
    caption: String,
    category: Option<String>,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let content_type = content_type_for(image)?;
    let bytes = tokio::fs::read(image).await?;
    let file_name = image
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let vm = CreatePostViewModel::new(repos.clone(), viewer);
    vm.on_event(CreatePostEvent::CaptionChanged(caption)).await;
    if let Some(category) = category {
        vm.on_event(CreatePostEvent::CategoryChanged(category)).await;
    }
    vm.on_event(CreatePostEvent::ImageSelected(SelectedImage {
        bytes,
        file_name,
        content_type: content_type.to_string(),
    }))
    .await;
    vm.on_event(CreatePostEvent::Submit).await;

    let state = vm.state();
    if let Some(message) = state.caption_error.or(state.image_error) {
        return Err(CliError::Screen(message));
    }
    let result = state
        .result
        .ok_or_else(|| CliError::Screen("Post was not submitted".to_string()))?;
    let post = resolved(result)?;
    println!("{}", post.id);
    Ok(())
}

async fn show<A, D, M>(
    repos: &Repositories<A, D, M>,
    viewer: User,
    id: &str,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let post_id: PostId = parse_id("post", id)?;
    let vm = PostDetailViewModel::new(repos.clone(), viewer, post_id);
    vm.on_event(PostDetailEvent::Load).await;
    let state = vm.state();
    let post = resolved(state.post)?;
    let threads = resolved(state.comments).unwrap_or_default();

    if as_json {
        return print_json(&post_to_list_item(&post));
    }
    for line in format_post_lines(std::slice::from_ref(&post)) {
        println!("{line}");
    }
    if !post.caption.is_empty() {
        println!("\n{}\n", post.caption);
    }
    println!("{}", post.image_url);
    if !threads.is_empty() {
        let shown: usize = threads.iter().map(CommentThread::total).sum();
        println!("\nComments ({shown}):");
    }
    for line in format_comment_lines(&threads) {
        println!("{line}");
    }
    Ok(())
}
