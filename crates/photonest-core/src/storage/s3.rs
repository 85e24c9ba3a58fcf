//! S3-compatible bucket storage (AWS S3, Cloudflare R2, MinIO).

use std::env;

use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use super::{normalize_content_type, normalize_object_key, MediaStorage};
use crate::{Error, Result};

const ENV_BUCKET: &str = "PHOTONEST_S3_BUCKET";
const ENV_REGION: &str = "PHOTONEST_S3_REGION";
const ENV_ENDPOINT_URL: &str = "PHOTONEST_S3_ENDPOINT_URL";
const ENV_ACCESS_KEY_ID: &str = "PHOTONEST_S3_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "PHOTONEST_S3_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "PHOTONEST_S3_PUBLIC_BASE_URL";

const DEFAULT_REGION: &str = "us-east-1";

/// Bucket configuration.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Public URL base (CDN or public bucket domain) for serving media.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl S3Config {
    /// Load bucket configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no storage variables are set and an error when
    /// only some of the required ones are.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        parse_config(lookup)
    }

    /// Check required values and normalize URLs.
    pub fn validated(mut self) -> Result<Self> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("bucket", &self.bucket),
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Storage configuration is incomplete. Missing: {}",
                missing.join(", ")
            )));
        }

        self.endpoint_url = normalize_url(self.endpoint_url.take(), "endpoint_url")?;
        self.public_base_url = normalize_url(self.public_base_url.take(), "public_base_url")?;
        self.region = crate::util::normalize_text_option(self.region.take());
        Ok(self)
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}

/// Bucket-backed media storage.
#[derive(Clone, Debug)]
pub struct S3MediaStorage {
    config: S3Config,
    client: Client,
}

impl S3MediaStorage {
    pub fn new(config: S3Config) -> Result<Self> {
        let config = config.validated()?;
        let client = build_s3_client(&config);
        Ok(Self { config, client })
    }

    pub const fn config(&self) -> &S3Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }
}

impl MediaStorage for S3MediaStorage {
    async fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let object_key = normalize_object_key(object_key)?;
        let size = bytes.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error("put_object", &self.config.bucket, Some(&object_key), error)
        })?;

        tracing::debug!("Uploaded {} bytes to {}", size, object_key);
        Ok(self.public_url(&object_key))
    }

    async fn delete(&self, object_key: &str) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "delete_object",
                    &self.config.bucket,
                    Some(&object_key),
                    error,
                )
            })?;
        Ok(())
    }

    fn public_url(&self, object_key: &str) -> String {
        let key = object_key.trim_matches('/');
        match (&self.config.public_base_url, &self.config.endpoint_url) {
            (Some(base), _) => format!("{base}/{key}"),
            (None, Some(endpoint)) => format!("{endpoint}/{}/{key}", self.config.bucket),
            (None, None) => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.config.bucket,
                self.config.region()
            ),
        }
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<S3Config>> {
    let read = |key: &str| lookup(key).map(|value| value.trim().to_string());
    let bucket = read(ENV_BUCKET);
    let region = read(ENV_REGION);
    let endpoint_url = read(ENV_ENDPOINT_URL);
    let access_key_id = read(ENV_ACCESS_KEY_ID);
    let secret_access_key = read(ENV_SECRET_ACCESS_KEY);
    let public_base_url = read(ENV_PUBLIC_BASE_URL);

    let any_present = [
        &bucket,
        &region,
        &endpoint_url,
        &access_key_id,
        &secret_access_key,
        &public_base_url,
    ]
    .iter()
    .any(|value| value.is_some());
    if !any_present {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if bucket.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_BUCKET);
    }
    if access_key_id.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_ACCESS_KEY_ID);
    }
    if secret_access_key.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_SECRET_ACCESS_KEY);
    }
    let (Some(bucket), Some(access_key_id), Some(secret_access_key)) =
        (bucket, access_key_id, secret_access_key)
    else {
        return Err(incomplete(&missing));
    };
    if !missing.is_empty() {
        return Err(incomplete(&missing));
    }

    S3Config {
        bucket,
        region,
        endpoint_url,
        access_key_id,
        secret_access_key,
        public_base_url,
    }
    .validated()
    .map(Some)
}

fn incomplete(missing: &[&str]) -> Error {
    Error::InvalidInput(format!(
        "Storage configuration is incomplete. Missing: {}",
        missing.join(", ")
    ))
}

fn normalize_url(value: Option<String>, name: &str) -> Result<Option<String>> {
    let Some(value) = crate::util::normalize_text_option(value) else {
        return Ok(None);
    };
    if !crate::util::is_http_url(&value) {
        return Err(Error::InvalidInput(format!(
            "Storage {name} must start with http:// or https://"
        )));
    }
    Ok(Some(value.trim_end_matches('/').to_string()))
}

fn build_s3_client(config: &S3Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "photonest-media-storage",
    );

    let mut builder = aws_sdk_s3::config::Builder::new()
        .region(Region::new(config.region().to_string()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Client::from_conf(builder.build())
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("S3 {operation} failed for {target}: {error}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<S3Config>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    fn full_map() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_BUCKET, "photos"),
            (ENV_ACCESS_KEY_ID, "AKID123"),
            (ENV_SECRET_ACCESS_KEY, "SECRET123"),
        ])
    }

    #[test]
    fn parse_config_none_returns_none() {
        assert!(parse_from_map(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn parse_config_reports_missing_values() {
        let map = HashMap::from([(ENV_BUCKET, "photos")]);
        match parse_from_map(&map).unwrap_err() {
            Error::InvalidInput(message) => {
                assert!(message.contains(ENV_ACCESS_KEY_ID));
                assert!(message.contains(ENV_SECRET_ACCESS_KEY));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_normalizes_urls() {
        let mut map = full_map();
        map.insert(ENV_ENDPOINT_URL, "https://account.r2.cloudflarestorage.com/");
        map.insert(ENV_PUBLIC_BASE_URL, "https://cdn.example.com/media/");

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(
            config.endpoint_url.as_deref(),
            Some("https://account.r2.cloudflarestorage.com")
        );
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://cdn.example.com/media")
        );
        assert_eq!(config.region(), DEFAULT_REGION);
    }

    #[test]
    fn parse_config_rejects_invalid_public_base_url() {
        let mut map = full_map();
        map.insert(ENV_PUBLIC_BASE_URL, "cdn.example.com/media");
        assert!(matches!(
            parse_from_map(&map),
            Err(Error::InvalidInput(message)) if message.contains("public_base_url")
        ));
    }

    #[test]
    fn public_url_prefers_cdn_then_endpoint() {
        let mut map = full_map();
        map.insert(ENV_PUBLIC_BASE_URL, "https://cdn.example.com");
        let storage = S3MediaStorage::new(parse_from_map(&map).unwrap().unwrap()).unwrap();
        assert_eq!(
            storage.public_url("/posts/u1/a.png"),
            "https://cdn.example.com/posts/u1/a.png"
        );

        let mut map = full_map();
        map.insert(ENV_ENDPOINT_URL, "http://localhost:9000");
        let storage = S3MediaStorage::new(parse_from_map(&map).unwrap().unwrap()).unwrap();
        assert_eq!(
            storage.public_url("posts/u1/a.png"),
            "http://localhost:9000/photos/posts/u1/a.png"
        );

        let storage = S3MediaStorage::new(parse_from_map(&full_map()).unwrap().unwrap()).unwrap();
        assert_eq!(
            storage.public_url("posts/u1/a.png"),
            "https://photos.s3.us-east-1.amazonaws.com/posts/u1/a.png"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let config = parse_from_map(&full_map()).unwrap().unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("SECRET123"));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires PHOTONEST_S3_* env vars plus network access"]
    async fn bucket_roundtrip_upload_delete() {
        let _ = dotenvy::dotenv();

        let config = S3Config::from_env()
            .expect("storage env parsing should not error")
            .expect("storage config should be present");
        let storage = S3MediaStorage::new(config).unwrap();
        storage.bucket_is_reachable().await.unwrap();

        let key = storage
            .build_media_key(crate::storage::MediaKind::PostImage, "integration", "roundtrip.txt")
            .unwrap();
        let url = storage
            .upload(&key, b"photonest-roundtrip".to_vec(), Some("text/plain"))
            .await
            .unwrap();
        assert!(url.ends_with(&key));
        storage.delete(&key).await.unwrap();
    }
}
