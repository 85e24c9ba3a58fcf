//! Data models for PhotoNest

mod category;
mod comment;
mod follow;
mod id;
mod notification;
mod post;
mod user;

pub use category::{normalize_category, Category};
pub use comment::{thread_comments, validate_comment_text, Comment, CommentId, CommentThread};
pub use follow::{
    bookmark_document_id, follow_document_id, like_document_id, Bookmark, Follow, FollowStatus,
    Like,
};
pub use notification::{Notification, NotificationId, NotificationKind};
pub use post::{extract_tags, validate_caption, Post, PostDraft, PostId};
pub use user::{validate_username, ProfileUpdate, User, UserId};

/// Remote field names, grouped per collection.
pub mod fields {
    pub use super::category::fields as category;
    pub use super::comment::fields as comment;
    pub use super::follow::fields as edge;
    pub use super::notification::fields as notification;
    pub use super::post::fields as post;
    pub use super::user::fields as user;
}

/// Remote collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const FOLLOWS: &str = "follows";
    pub const LIKES: &str = "likes";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const CATEGORIES: &str = "categories";
}
