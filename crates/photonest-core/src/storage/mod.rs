//! Object storage for post images and profile pictures.

mod memory;
mod s3;

use std::future::Future;

use chrono::Utc;
use uuid::Uuid;

pub use memory::InMemoryMediaStorage;
pub use s3::{S3Config, S3MediaStorage};

use crate::{Error, Result};

/// What an uploaded object is for; decides its key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    PostImage,
    ProfileImage,
}

impl MediaKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::PostImage => "posts",
            Self::ProfileImage => "profile_images",
        }
    }
}

/// Media storage operations shared across object backends.
pub trait MediaStorage: Clone + Send + Sync + 'static {
    /// Build a unique object key namespaced by kind and owner.
    fn build_media_key(&self, kind: MediaKind, owner_id: &str, file_name: &str) -> Result<String> {
        let owner = sanitize_token(owner_id);
        if owner.is_empty() {
            return Err(Error::InvalidInput(
                "Media owner id cannot be empty".to_string(),
            ));
        }

        let file_name = sanitize_file_name(file_name);
        let ts = Utc::now().timestamp_millis();
        let id = Uuid::now_v7();
        Ok(format!("{}/{owner}/{ts}-{id}-{file_name}", kind.prefix()))
    }

    /// Store the bytes under `object_key`, returning the URL they are served from.
    fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;

    fn delete(&self, object_key: &str) -> impl Future<Output = Result<()>> + Send;

    /// URL an object key is served from.
    fn public_url(&self, object_key: &str) -> String;
}

pub(crate) fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput(
            "Media object key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

pub(crate) fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn sanitize_file_name(file_name: &str) -> String {
    let trimmed = file_name.trim().trim_matches('/');
    let (stem, ext) = trimmed
        .rsplit_once('.')
        .map_or((trimmed, ""), |parts| parts);
    let stem = match sanitize_token(stem) {
        stem if stem.is_empty() => "image".to_string(),
        stem => stem,
    };
    let ext = sanitize_token(ext);

    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}
