//! Notification model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::uuid_id;
use super::{PostId, User, UserId};

/// Remote field names for notification documents.
pub mod fields {
    pub const RECIPIENT_ID: &str = "recipientId";
    pub const ACTOR_ID: &str = "actorId";
    pub const KIND: &str = "kind";
    pub const POST_ID: &str = "postId";
    pub const IS_READ: &str = "isRead";
    pub const CREATED_AT: &str = "createdAt";
}

uuid_id!(
    /// A unique identifier for a notification
    NotificationId
);

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    FollowRequest,
    FollowAccepted,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::FollowRequest => "follow_request",
            Self::FollowAccepted => "follow_accepted",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "follow" => Ok(Self::Follow),
            "follow_request" => Ok(Self::FollowRequest),
            "follow_accepted" => Ok(Self::FollowAccepted),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// A typed event delivered to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub actor_username: String,
    #[serde(default)]
    pub actor_profile_image_url: Option<String>,
    pub kind: NotificationKind,
    /// Post the event refers to, for likes and comments
    #[serde(default)]
    pub post_id: Option<PostId>,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Notification {
    /// Build a notification from `actor` to `recipient`
    pub fn new(
        recipient_id: UserId,
        actor: &User,
        kind: NotificationKind,
        post_id: Option<PostId>,
        detail: Option<&str>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient_id,
            actor_id: actor.id.clone(),
            actor_username: actor.username.clone(),
            actor_profile_image_url: actor.profile_image_url.clone(),
            kind,
            post_id,
            message: render_message(kind, &actor.username, detail),
            is_read: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

fn render_message(kind: NotificationKind, actor: &str, detail: Option<&str>) -> String {
    match kind {
        NotificationKind::Like => format!("{actor} liked your post"),
        NotificationKind::Comment => match detail.map(str::trim).filter(|d| !d.is_empty()) {
            Some(text) => {
                let preview: String = text.chars().take(60).collect();
                format!("{actor} commented: {preview}")
            }
            None => format!("{actor} commented on your post"),
        },
        NotificationKind::Follow => format!("{actor} started following you"),
        NotificationKind::FollowRequest => format!("{actor} requested to follow you"),
        NotificationKind::FollowAccepted => format!("{actor} accepted your follow request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> User {
        User::new(UserId::new("uid-1"), "alice", "a@example.com", "Alice")
    }

    #[test]
    fn kind_roundtrips_through_str() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Follow,
            NotificationKind::FollowRequest,
            NotificationKind::FollowAccepted,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("poke".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn comment_message_previews_text() {
        let notification = Notification::new(
            UserId::new("uid-2"),
            &actor(),
            NotificationKind::Comment,
            Some(PostId::new()),
            Some("  what a view  "),
        );
        assert_eq!(notification.message, "alice commented: what a view");
        assert!(!notification.is_read);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_value(NotificationKind::FollowRequest).unwrap();
        assert_eq!(json, "follow_request");
    }
}
