//! Category model

use serde::{Deserialize, Serialize};

/// Remote field names for category documents.
pub mod fields {
    pub const NAME: &str = "name";
    pub const POST_COUNT: &str = "postCount";
    pub const LAST_USED_AT: &str = "lastUsedAt";
}

const CATEGORY_MAX_LEN: usize = 32;

/// A post category with its popularity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Lowercase name, also the document id
    pub name: String,
    #[serde(default)]
    pub post_count: i64,
    /// Last time a post used this category (Unix ms)
    #[serde(default)]
    pub last_used_at: i64,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            post_count: 0,
            last_used_at: 0,
        }
    }
}

/// Normalize a category name, returning `None` for blank input
///
/// Names are trimmed, lowercased and have inner whitespace collapsed to a
/// single dash.
pub fn normalize_category(raw: &str) -> Option<String> {
    let name = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    let name: String = name
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '-' || *ch == '_')
        .take(CATEGORY_MAX_LEN)
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
