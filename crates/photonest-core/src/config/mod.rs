//! Application configuration.
//!
//! `AppConfig` selects the backend (Firebase or the in-process demo backend)
//! and carries the public endpoints/keys the clients need. It is read from an
//! optional JSON file and then overridden by `PHOTONEST_*` environment
//! variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::S3Config;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_BACKEND: &str = "PHOTONEST_BACKEND";
const ENV_PROJECT_ID: &str = "PHOTONEST_FIREBASE_PROJECT_ID";
const ENV_API_KEY: &str = "PHOTONEST_FIREBASE_API_KEY";
const ENV_OTP_BASE_URL: &str = "PHOTONEST_OTP_BASE_URL";
const ENV_CACHE_PATH: &str = "PHOTONEST_CACHE_PATH";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Firebase,
    /// Everything in process memory; nothing leaves the machine
    Memory,
}

impl std::str::FromStr for BackendMode {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "memory" | "demo" => Ok(Self::Memory),
            other => Err(Error::InvalidInput(format!(
                "Unknown backend '{other}' (expected firebase or memory)"
            ))),
        }
    }
}

/// Public Firebase project settings. The web API key is not a secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Override for the Firestore REST base URL (emulators)
    #[serde(default)]
    pub firestore_url: Option<String>,
    /// Override for the Identity Toolkit and Secure Token base URL (emulators)
    #[serde(default)]
    pub auth_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendMode,
    #[serde(default)]
    pub firebase: Option<FirebaseConfig>,
    #[serde(default)]
    pub otp_base_url: Option<String>,
    #[serde(default)]
    pub media: Option<S3Config>,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_json_str(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::InvalidInput(format!("Invalid config file: {error}")))
    }

    /// Read the optional config file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::from_json_str(&std::fs::read_to_string(path)?)?
            }
            _ => Self::default(),
        };
        config
            .with_overrides(|key| std::env::var(key).ok())?
            .validated()
    }

    /// Apply `PHOTONEST_*` overrides from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(backend) = read(ENV_BACKEND) {
            self.backend = backend.parse()?;
        }

        let project_id = read(ENV_PROJECT_ID);
        let api_key = read(ENV_API_KEY);
        if project_id.is_some() || api_key.is_some() {
            let firebase = self.firebase.get_or_insert_with(FirebaseConfig::default);
            if let Some(project_id) = project_id {
                firebase.project_id = project_id;
            }
            if let Some(api_key) = api_key {
                firebase.api_key = api_key;
            }
        }

        if let Some(url) = read(ENV_OTP_BASE_URL) {
            self.otp_base_url = Some(url);
        }
        if let Some(path) = read(ENV_CACHE_PATH) {
            self.cache_path = Some(PathBuf::from(path));
        }
        if let Some(media) = S3Config::from_lookup(&lookup)? {
            self.media = Some(media);
        }
        Ok(self)
    }

    /// Reject partial or malformed configuration.
    pub fn validated(mut self) -> Result<Self> {
        if let Some(firebase) = self.firebase.as_mut() {
            firebase.project_id = firebase.project_id.trim().to_string();
            firebase.api_key = firebase.api_key.trim().to_string();
            firebase.firestore_url = normalize_url(firebase.firestore_url.take(), "firestore_url")?;
            firebase.auth_url = normalize_url(firebase.auth_url.take(), "auth_url")?;
        }

        if self.backend == BackendMode::Firebase {
            let firebase = self.firebase.as_ref();
            let mut missing = Vec::new();
            if firebase.map_or(true, |f| f.project_id.is_empty()) {
                missing.push(ENV_PROJECT_ID);
            }
            if firebase.map_or(true, |f| f.api_key.is_empty()) {
                missing.push(ENV_API_KEY);
            }
            if !missing.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Firebase configuration is incomplete. Missing: {}",
                    missing.join(", ")
                )));
            }
        }

        self.otp_base_url = normalize_url(self.otp_base_url.take(), "otp_base_url")?;
        self.media = self.media.take().map(S3Config::validated).transpose()?;
        Ok(self)
    }

    /// Configuration for the fully local demo backend.
    pub fn memory() -> Self {
        Self {
            backend: BackendMode::Memory,
            ..Self::default()
        }
    }
}

fn normalize_url(value: Option<String>, field: &str) -> Result<Option<String>> {
    let Some(value) = normalize_text_option(value) else {
        return Ok(None);
    };
    if !is_http_url(&value) {
        return Err(Error::InvalidInput(format!(
            "Config field '{field}' must include http:// or https://"
        )));
    }
    Ok(Some(value.trim_end_matches('/').to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup<'a>(map: &'a HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|value| (*value).to_string())
    }

    #[test]
    fn parses_file_and_rejects_unknown_fields() {
        let config = AppConfig::from_json_str(
            r#"{
                "backend": "firebase",
                "firebase": {"project_id": "demo", "api_key": "key"},
                "otp_base_url": "https://otp.example.com/"
            }"#,
        )
        .unwrap()
        .validated()
        .unwrap();
        assert_eq!(config.firebase.unwrap().project_id, "demo");
        assert_eq!(config.otp_base_url.as_deref(), Some("https://otp.example.com"));

        let error = AppConfig::from_json_str(r#"{"backend": "memory", "surprise": 1}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env = HashMap::from([
            (ENV_PROJECT_ID, "from-env"),
            (ENV_API_KEY, "env-key"),
            (ENV_CACHE_PATH, "/tmp/photonest.db"),
        ]);
        let config = AppConfig::from_json_str(r#"{"firebase": {"project_id": "from-file"}}"#)
            .unwrap()
            .with_overrides(lookup(&env))
            .unwrap()
            .validated()
            .unwrap();

        let firebase = config.firebase.unwrap();
        assert_eq!(firebase.project_id, "from-env");
        assert_eq!(firebase.api_key, "env-key");
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/photonest.db")));
    }

    #[test]
    fn firebase_mode_requires_project_and_key() {
        let env = HashMap::from([(ENV_PROJECT_ID, "demo")]);
        let error = AppConfig::default()
            .with_overrides(lookup(&env))
            .unwrap()
            .validated()
            .unwrap_err();
        assert!(error.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn memory_mode_needs_nothing() {
        let env = HashMap::from([(ENV_BACKEND, "memory")]);
        let config = AppConfig::default()
            .with_overrides(lookup(&env))
            .unwrap()
            .validated()
            .unwrap();
        assert_eq!(config, AppConfig::memory());
    }

    #[test]
    fn rejects_bad_urls_and_backends() {
        let mut config = AppConfig::memory();
        config.otp_base_url = Some("otp.example.com".to_string());
        assert!(config.validated().is_err());

        let env = HashMap::from([(ENV_BACKEND, "couchdb")]);
        assert!(AppConfig::default().with_overrides(lookup(&env)).is_err());
    }
}
