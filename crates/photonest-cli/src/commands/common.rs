use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use photonest_core::auth::AuthProvider;
use photonest_core::models::{Category, CommentThread, Notification, Post, User};
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;
use photonest_core::Resource;
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: String,
    pub username: String,
    pub caption: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub liked: bool,
    pub bookmarked: bool,
    pub image_url: String,
    pub created_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub bio: String,
    pub is_private: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

/// The signed-in user, restoring the stored session first
pub async fn signed_in_user<A, D, M>(repos: &Repositories<A, D, M>) -> Result<User, CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    repos
        .auth
        .restore_session()
        .await?
        .ok_or(CliError::NotSignedIn)
}

/// Look a user up by exact handle
pub async fn user_by_username<A, D, M>(
    repos: &Repositories<A, D, M>,
    username: &str,
) -> Result<User, CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let handle = username.trim().trim_start_matches('@').to_lowercase();
    repos
        .users
        .search_users(&handle, 10)
        .await?
        .into_iter()
        .find(|user| user.username == handle)
        .ok_or(CliError::UnknownUser(handle))
}

/// Settle a screen resource into a command result
pub fn resolved<T>(resource: Resource<T>) -> Result<T, CliError> {
    match resource {
        Resource::Success(data) => Ok(data),
        Resource::Error(message) => Err(CliError::Screen(message)),
        Resource::Loading => Err(CliError::Screen("Request did not complete".to_string())),
    }
}

pub fn parse_id<T: FromStr>(kind: &'static str, raw: &str) -> Result<T, CliError> {
    raw.trim().parse().map_err(|_| CliError::InvalidId {
        kind,
        value: raw.trim().to_string(),
    })
}

pub fn content_type_for(path: &Path) -> Result<&'static str, CliError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        "heic" => Ok("image/heic"),
        _ => Err(CliError::UnsupportedImage(path.display().to_string())),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_posts(posts: &[Post], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = posts.iter().map(post_to_list_item).collect::<Vec<_>>();
        return print_json(&items);
    }
    if posts.is_empty() {
        println!("No posts yet.");
    }
    for line in format_post_lines(posts) {
        println!("{line}");
    }
    Ok(())
}

pub fn print_users(users: &[User], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = users.iter().map(user_to_list_item).collect::<Vec<_>>();
        return print_json(&items);
    }
    for user in users {
        println!("{}", format_user_line(user));
    }
    Ok(())
}

pub fn post_to_list_item(post: &Post) -> PostListItem {
    PostListItem {
        id: post.id.to_string(),
        username: post.username.clone(),
        caption: post.caption.clone(),
        category: post.category.clone(),
        tags: post.tags.clone(),
        likes_count: post.likes_count,
        comments_count: post.comments_count,
        liked: post.is_liked,
        bookmarked: post.is_bookmarked,
        image_url: post.image_url.clone(),
        created_at: post.created_at,
        relative_time: format_relative_time(post.created_at, Utc::now().timestamp_millis()),
    }
}

pub fn user_to_list_item(user: &User) -> UserListItem {
    UserListItem {
        id: user.id.to_string(),
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        bio: user.bio.clone(),
        is_private: user.is_private,
        followers_count: user.followers_count,
        following_count: user.following_count,
        posts_count: user.posts_count,
    }
}

pub fn format_post_lines(posts: &[Post]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    posts
        .iter()
        .map(|post| {
            let handle = format!("@{}", post.username);
            let caption = preview(&post.caption, 40);
            let liked = if post.is_liked { "*" } else { " " };
            format!(
                "{}  {handle:<18} {caption:<40}  {liked}{} likes  {} comments  {}",
                post.id,
                post.likes_count,
                post.comments_count,
                format_relative_time(post.created_at, now_ms)
            )
        })
        .collect()
}

pub fn format_user_line(user: &User) -> String {
    let lock = if user.is_private { " [private]" } else { "" };
    format!(
        "@{}{lock}  {}  {} posts  {} followers  {} following",
        user.username,
        user.display_name(),
        user.posts_count,
        user.followers_count,
        user.following_count
    )
}

pub fn format_comment_lines(threads: &[CommentThread]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    let mut lines = Vec::new();
    for thread in threads {
        let root = &thread.comment;
        // replies whose parent is gone are shown at top level
        let marker = if root.is_reply() { "re: " } else { "" };
        lines.push(format!(
            "{}  @{}: {marker}{}  ({})",
            root.id,
            root.username,
            root.text,
            format_relative_time(root.created_at, now_ms)
        ));
        for reply in &thread.replies {
            lines.push(format!(
                "    {}  @{}: {}  ({})",
                reply.id,
                reply.username,
                reply.text,
                format_relative_time(reply.created_at, now_ms)
            ));
        }
    }
    lines
}

pub fn format_notification_line(notification: &Notification, now_ms: i64) -> String {
    let marker = if notification.is_read { " " } else { "*" };
    format!(
        "{marker} {}  {}",
        format_relative_time(notification.created_at, now_ms),
        notification.message
    )
}

pub fn format_category_line(category: &Category) -> String {
    format!("{:<24} {} posts", category.name, category.post_count)
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < year {
        format!("{}w ago", diff / week)
    } else {
        format!("{}y ago", diff / year)
    }
}
