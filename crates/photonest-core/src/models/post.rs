//! Post model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use super::id::uuid_id;
use super::{normalize_category, User, UserId};
use crate::error::{Error, Result};

const CAPTION_MAX_LEN: usize = 2200;

/// Remote field names for post documents.
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const CATEGORY: &str = "category";
    pub const TAGS: &str = "tags";
    pub const CAPTION: &str = "caption";
    pub const LIKES_COUNT: &str = "likesCount";
    pub const COMMENTS_COUNT: &str = "commentsCount";
    pub const CREATED_AT: &str = "createdAt";
}

uuid_id!(
    /// A unique identifier for a post, using UUID v7 (time-sortable)
    PostId
);

/// A published photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    /// Author
    pub user_id: UserId,
    /// Author handle, denormalized for feed rendering
    pub username: String,
    #[serde(default)]
    pub user_profile_image_url: Option<String>,
    /// Public URL of the uploaded image
    pub image_url: String,
    /// Object storage key of the uploaded image
    #[serde(default)]
    pub image_key: String,
    #[serde(default)]
    pub caption: String,
    /// Normalized category name
    #[serde(default)]
    pub category: Option<String>,
    /// Hashtags extracted from the caption
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Whether the current viewer liked this post (never stored remotely)
    #[serde(skip)]
    pub is_liked: bool,
    /// Whether the current viewer bookmarked this post (never stored remotely)
    #[serde(skip)]
    pub is_bookmarked: bool,
}

impl Post {
    /// Build a new post authored by `author`
    pub fn new(author: &User, draft: &PostDraft, image_url: String, image_key: String) -> Self {
        Self {
            id: PostId::new(),
            user_id: author.id.clone(),
            username: author.username.clone(),
            user_profile_image_url: author.profile_image_url.clone(),
            image_url,
            image_key,
            caption: draft.caption.clone(),
            category: draft.category.clone(),
            tags: extract_tags(&draft.caption),
            likes_count: 0,
            comments_count: 0,
            created_at: chrono::Utc::now().timestamp_millis(),
            is_liked: false,
            is_bookmarked: false,
        }
    }

    /// Flip the viewer's like, keeping the counter consistent
    pub fn apply_like_toggle(&mut self) {
        if self.is_liked {
            self.is_liked = false;
            self.likes_count = (self.likes_count - 1).max(0);
        } else {
            self.is_liked = true;
            self.likes_count += 1;
        }
    }

    /// Replace the caption and recompute hashtags
    pub fn set_caption(&mut self, caption: String) {
        self.tags = extract_tags(&caption);
        self.caption = caption;
    }

    #[must_use]
    pub fn is_authored_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

/// Validated input for creating a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub caption: String,
    pub category: Option<String>,
    pub image_bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl PostDraft {
    /// Validate raw input from the create-post screen
    pub fn new(
        caption: &str,
        category: Option<&str>,
        image_bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<Self> {
        if image_bytes.is_empty() {
            return Err(Error::InvalidInput("Please select an image".to_string()));
        }
        let content_type = content_type.trim().to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(Error::InvalidInput(
                "Only image files can be posted".to_string(),
            ));
        }

        Ok(Self {
            caption: validate_caption(caption)?,
            category: category.and_then(normalize_category),
            image_bytes,
            file_name: file_name.trim().to_string(),
            content_type,
        })
    }
}

/// Validate and trim a caption
pub fn validate_caption(caption: &str) -> Result<String> {
    let caption = caption.trim();
    if caption.chars().count() > CAPTION_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Caption must be at most {CAPTION_MAX_LEN} characters"
        )));
    }
    Ok(caption.to_string())
}

/// Extract #hashtags from a caption
///
/// Valid tags match the pattern: `#[a-zA-Z][a-zA-Z0-9_]*`
/// Tags are returned in lowercase, deduplicated and sorted.
///
/// # Examples
///
/// ```
/// use photonest_core::models::extract_tags;
///
/// let tags = extract_tags("Golden hour #Sunset over the #sea #sunset");
/// assert_eq!(tags, vec!["sea".to_string(), "sunset".to_string()]);
/// ```
#[must_use]
pub fn extract_tags(text: &str) -> Vec<String> {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let re = TAG_RE.get_or_init(|| Regex::new(r"#([a-zA-Z][a-zA-Z0-9_]*)").expect("Invalid regex"));
    re.captures_iter(text)
        .map(|cap| cap[1].to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> User {
        User::new(UserId::new("uid-1"), "alice", "a@example.com", "Alice")
    }

    fn draft(caption: &str) -> PostDraft {
        PostDraft::new(caption, Some(" Travel "), vec![1, 2, 3], "pic.jpg", "image/jpeg").unwrap()
    }

    #[test]
    fn post_id_parse() {
        let id = PostId::new();
        let parsed: PostId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        let padded: PostId = format!(" {id} ").parse().unwrap();
        assert_eq!(id, padded);
        assert!("not-a-uuid".parse::<PostId>().is_err());
    }

    #[test]
    fn new_post_extracts_tags_and_category() {
        let post = Post::new(
            &author(),
            &draft("Lisbon #travel #Food"),
            "https://cdn/x.jpg".to_string(),
            "posts/uid-1/x.jpg".to_string(),
        );
        assert_eq!(post.tags, vec!["food", "travel"]);
        assert_eq!(post.category.as_deref(), Some("travel"));
        assert_eq!(post.username, "alice");
        assert_eq!(post.likes_count, 0);
    }

    #[test]
    fn like_toggle_never_goes_negative() {
        let mut post = Post::new(&author(), &draft(""), String::new(), String::new());
        post.is_liked = true;
        post.apply_like_toggle();
        assert!(!post.is_liked);
        assert_eq!(post.likes_count, 0);
        post.apply_like_toggle();
        assert!(post.is_liked);
        assert_eq!(post.likes_count, 1);
    }

    #[test]
    fn draft_requires_image() {
        let err = PostDraft::new("hi", None, Vec::new(), "a.jpg", "image/jpeg").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = PostDraft::new("hi", None, vec![1], "a.txt", "text/plain").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn caption_length_is_limited() {
        assert!(validate_caption(&"c".repeat(2201)).is_err());
        assert_eq!(validate_caption("  ok  ").unwrap(), "ok");
    }

    #[test]
    fn extract_tags_rejects_numeric_start() {
        assert!(extract_tags("#123 #4ever").is_empty());
        assert_eq!(extract_tags("#my_tag #My_Tag"), vec!["my_tag"]);
    }

    #[test]
    fn viewer_flags_are_not_serialized() {
        let mut post = Post::new(&author(), &draft(""), String::new(), String::new());
        post.is_liked = true;
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("isLiked").is_none());
        assert!(json.get("likesCount").is_some());
    }
}
