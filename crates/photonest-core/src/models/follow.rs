//! Follow edges, likes and bookmarks

use serde::{Deserialize, Serialize};

use super::{PostId, UserId};

/// Remote field names for edge documents.
pub mod fields {
    pub const FOLLOWER_ID: &str = "followerId";
    pub const FOLLOWEE_ID: &str = "followeeId";
    pub const ACCEPTED: &str = "accepted";
    pub const POST_ID: &str = "postId";
    pub const USER_ID: &str = "userId";
    pub const CREATED_AT: &str = "createdAt";
}

/// A directed follow edge
///
/// Edges to private accounts start unaccepted (a follow request) and only
/// count toward follower totals once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub accepted: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Follow {
    pub fn new(follower_id: UserId, followee_id: UserId, accepted: bool) -> Self {
        Self {
            follower_id,
            followee_id,
            accepted,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Document id of the edge, unique per ordered pair
    #[must_use]
    pub fn document_id(&self) -> String {
        follow_document_id(&self.follower_id, &self.followee_id)
    }
}

pub fn follow_document_id(follower_id: &UserId, followee_id: &UserId) -> String {
    format!("{follower_id}_{followee_id}")
}

/// Relationship of the viewer to another account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowStatus {
    #[default]
    NotFollowing,
    Requested,
    Following,
}

impl FollowStatus {
    pub fn from_edge(edge: Option<&Follow>) -> Self {
        match edge {
            None => Self::NotFollowing,
            Some(edge) if edge.accepted => Self::Following,
            Some(_) => Self::Requested,
        }
    }
}

/// A like of a post by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: i64,
}

impl Like {
    pub fn new(post_id: PostId, user_id: UserId) -> Self {
        Self {
            post_id,
            user_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

pub fn like_document_id(post_id: &PostId, user_id: &UserId) -> String {
    format!("{post_id}_{user_id}")
}

/// A saved post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub user_id: UserId,
    pub post_id: PostId,
    pub created_at: i64,
}

impl Bookmark {
    pub fn new(user_id: UserId, post_id: PostId) -> Self {
        Self {
            user_id,
            post_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

pub fn bookmark_document_id(user_id: &UserId, post_id: &PostId) -> String {
    format!("{user_id}_{post_id}")
}
