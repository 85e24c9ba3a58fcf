//! User profile model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 30;
const BIO_MAX_LEN: usize = 150;
const FULL_NAME_MAX_LEN: usize = 60;

/// Remote field names for user documents.
pub mod fields {
    pub const USERNAME: &str = "username";
    pub const FOLLOWERS_COUNT: &str = "followersCount";
    pub const FOLLOWING_COUNT: &str = "followingCount";
    pub const POSTS_COUNT: &str = "postsCount";
    pub const FOLLOWERS: &str = "followers";
    pub const FOLLOWING: &str = "following";
}

/// Identifier issued by the authentication service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an auth-issued user id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Unique, lowercase handle
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub posts_count: i64,
    /// Private accounts must accept follow requests
    #[serde(default)]
    pub is_private: bool,
    /// Accepted followers
    #[serde(default)]
    pub followers: Vec<UserId>,
    /// Accounts this user follows (accepted edges only)
    #[serde(default)]
    pub following: Vec<UserId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl User {
    /// Create a fresh profile for a newly registered account
    pub fn new(id: UserId, username: &str, email: &str, full_name: &str) -> Self {
        Self {
            id,
            username: username.trim().to_lowercase(),
            email: email.trim().to_string(),
            full_name: full_name.trim().to_string(),
            bio: String::new(),
            profile_image_url: None,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            is_private: false,
            followers: Vec::new(),
            following: Vec::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Name shown on screen: full name when set, otherwise the handle
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }

    #[must_use]
    pub fn is_followed_by(&self, user_id: &UserId) -> bool {
        self.followers.contains(user_id)
    }
}

/// Editable subset of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub is_private: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.bio.is_none()
            && self.is_private.is_none()
    }

    /// Validate and normalize the update in place
    pub fn normalized(mut self) -> Result<Self> {
        if let Some(username) = self.username.take() {
            self.username = Some(validate_username(&username)?);
        }
        if let Some(full_name) = self.full_name.take() {
            let full_name = full_name.trim().to_string();
            if full_name.chars().count() > FULL_NAME_MAX_LEN {
                return Err(Error::InvalidInput(format!(
                    "Full name must be at most {FULL_NAME_MAX_LEN} characters"
                )));
            }
            self.full_name = Some(full_name);
        }
        if let Some(bio) = self.bio.take() {
            let bio = bio.trim().to_string();
            if bio.chars().count() > BIO_MAX_LEN {
                return Err(Error::InvalidInput(format!(
                    "Bio must be at most {BIO_MAX_LEN} characters"
                )));
            }
            self.bio = Some(bio);
        }
        Ok(self)
    }

    /// Apply the update to a profile
    pub fn apply_to(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username.clone_from(username);
        }
        if let Some(full_name) = &self.full_name {
            user.full_name.clone_from(full_name);
        }
        if let Some(bio) = &self.bio {
            user.bio.clone_from(bio);
        }
        if let Some(is_private) = self.is_private {
            user.is_private = is_private;
        }
    }
}

/// Validate a username and return its normalized (lowercase) form
///
/// Usernames are 3-30 characters of `a-z`, `0-9`, `.` and `_`.
pub fn validate_username(raw: &str) -> Result<String> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "Username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '.' || ch == '_')
    {
        return Err(Error::InvalidInput(
            "Username may only contain letters, numbers, '.' and '_'".to_string(),
        ));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_normalizes_username() {
        let user = User::new(UserId::new("uid-1"), "  Alice_B ", "a@example.com", "Alice");
        assert_eq!(user.username, "alice_b");
        assert_eq!(user.followers_count, 0);
        assert!(!user.is_private);
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User::new(UserId::new("uid-1"), "alice", "a@example.com", "");
        assert_eq!(user.display_name(), "alice");
        user.full_name = "Alice Liddell".to_string();
        assert_eq!(user.display_name(), "Alice Liddell");
    }

    #[test]
    fn validate_username_rules() {
        assert_eq!(validate_username("Bob.Smith").unwrap(), "bob.smith");
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(31)).is_err());
    }

    #[test]
    fn profile_update_rejects_long_bio() {
        let update = ProfileUpdate {
            bio: Some("b".repeat(151)),
            ..Default::default()
        };
        assert!(update.normalized().is_err());
    }

    #[test]
    fn profile_update_applies_fields() {
        let mut user = User::new(UserId::new("uid-1"), "alice", "a@example.com", "Alice");
        let update = ProfileUpdate {
            bio: Some(" hello ".to_string()),
            is_private: Some(true),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        update.apply_to(&mut user);
        assert_eq!(user.bio, "hello");
        assert!(user.is_private);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn user_serializes_camel_case() {
        let user = User::new(UserId::new("uid-1"), "alice", "a@example.com", "Alice");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "uid-1");
        assert!(json.get("followersCount").is_some());
        assert!(json.get("profileImageUrl").is_some());
    }
}
