//! Comment model and threading

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::uuid_id;
use super::{PostId, User, UserId};
use crate::error::{Error, Result};

const COMMENT_MAX_LEN: usize = 500;

/// Remote field names for comment documents.
pub mod fields {
    pub const POST_ID: &str = "postId";
    pub const PARENT_ID: &str = "parentId";
    pub const CREATED_AT: &str = "createdAt";
}

uuid_id!(
    /// A unique identifier for a comment
    CommentId
);

/// A comment on a post, optionally replying to another comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub user_profile_image_url: Option<String>,
    pub text: String,
    /// Comment this one replies to
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Comment {
    pub fn new(post_id: PostId, author: &User, text: &str, parent_id: Option<CommentId>) -> Result<Self> {
        Ok(Self {
            id: CommentId::new(),
            post_id,
            user_id: author.id.clone(),
            username: author.username.clone(),
            user_profile_image_url: author.profile_image_url.clone(),
            text: validate_comment_text(text)?,
            parent_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub const fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// A top-level comment with its replies, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

impl CommentThread {
    /// Number of comments in the thread, including the root
    pub fn total(&self) -> usize {
        1 + self.replies.len()
    }
}

/// Group a flat comment list into threads
///
/// Replies are attached to their top-level ancestor. Replies whose parent is
/// missing (deleted, or not loaded) are promoted to top-level threads so they
/// stay visible.
pub fn thread_comments(mut comments: Vec<Comment>) -> Vec<CommentThread> {
    comments.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let parents: HashMap<CommentId, Option<CommentId>> = comments
        .iter()
        .map(|comment| (comment.id, comment.parent_id))
        .collect();

    let root_of = |comment: &Comment| -> Option<CommentId> {
        let mut current = comment.parent_id?;
        // Bounded walk guards against parent cycles in corrupt data
        for _ in 0..parents.len() {
            match parents.get(&current) {
                Some(Some(next)) => current = *next,
                Some(None) => return Some(current),
                None => return None,
            }
        }
        None
    };

    let mut threads: Vec<CommentThread> = Vec::new();
    let mut index: HashMap<CommentId, usize> = HashMap::new();
    let mut pending: Vec<(CommentId, Comment)> = Vec::new();

    for comment in comments {
        match root_of(&comment) {
            Some(root) => pending.push((root, comment)),
            None => {
                index.insert(comment.id, threads.len());
                threads.push(CommentThread {
                    comment,
                    replies: Vec::new(),
                });
            }
        }
    }

    for (root, reply) in pending {
        if let Some(&position) = index.get(&root) {
            threads[position].replies.push(reply);
        }
    }

    threads
}

/// Validate and trim comment text
pub fn validate_comment_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("Comment cannot be empty".to_string()));
    }
    if text.chars().count() > COMMENT_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Comment must be at most {COMMENT_MAX_LEN} characters"
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn author() -> User {
        User::new(UserId::new("uid-1"), "alice", "a@example.com", "Alice")
    }

    fn comment_at(post: PostId, text: &str, parent: Option<CommentId>, at: i64) -> Comment {
        let mut comment = Comment::new(post, &author(), text, parent).unwrap();
        comment.created_at = at;
        comment
    }

    #[test]
    fn rejects_empty_and_long_text() {
        assert!(validate_comment_text("   ").is_err());
        assert!(validate_comment_text(&"x".repeat(501)).is_err());
        assert_eq!(validate_comment_text(" nice ").unwrap(), "nice");
    }

    #[test]
    fn threads_nest_replies_under_root() {
        let post = PostId::new();
        let root = comment_at(post, "root", None, 1);
        let reply = comment_at(post, "reply", Some(root.id), 2);
        let nested = comment_at(post, "nested", Some(reply.id), 3);
        let other = comment_at(post, "other", None, 4);

        let threads = thread_comments(vec![other.clone(), nested.clone(), root.clone(), reply.clone()]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, root.id);
        assert_eq!(
            threads[0]
                .replies
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>(),
            vec!["reply", "nested"]
        );
        assert_eq!(threads[0].total(), 3);
        assert!(nested.is_reply());
        assert_eq!(threads[1].comment.id, other.id);
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn orphaned_replies_become_roots() {
        let post = PostId::new();
        let orphan = comment_at(post, "orphan", Some(CommentId::new()), 1);

        let threads = thread_comments(vec![orphan.clone()]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, orphan.id);
        assert!(threads[0].comment.is_reply());
    }
}
