//! PhotoNest CLI - photo sharing from the terminal
//!
//! Talks to the configured Firebase project, or to a throwaway in-memory
//! backend with `--backend memory`.

mod cli;
mod commands;
mod error;
mod session_store;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use clap::Parser;
use photonest_core::auth::{
    FirebaseAuthClient, FirebaseAuthEndpoints, InMemoryAuthProvider, SessionHandle,
};
use photonest_core::config::{AppConfig, BackendMode};
use photonest_core::db::LocalCache;
use photonest_core::otp::OtpClient;
use photonest_core::remote::{FirestoreDocumentStore, InMemoryDocumentStore};
use photonest_core::repository::Repositories;
use photonest_core::storage::{InMemoryMediaStorage, S3MediaStorage};
use tracing_subscriber::EnvFilter;

use crate::cli::{BackendArg, Cli, Commands};
use crate::error::CliError;
use crate::session_store::KeychainSessionStore;

const CONFIG_FILE_NAME: &str = "config.json";
const CACHE_FILE_NAME: &str = "cache.db";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if matches!(cli.command, Commands::Demo) {
        return commands::demo::run_demo().await;
    }

    let config_path = cli.config.clone().or_else(default_config_path);
    let config = load_config(config_path.as_deref(), &cli, |key| std::env::var(key).ok())?;

    match config.backend {
        BackendMode::Memory => {
            tracing::warn!("Using the in-memory backend; nothing is kept after this command");
            let repos = Repositories::new(
                InMemoryAuthProvider::new(),
                InMemoryDocumentStore::new(),
                InMemoryMediaStorage::new(),
                LocalCache::open_in_memory().await?,
                SessionHandle::new(),
                otp_client(&config)?,
            );
            commands::dispatch(&repos, cli.command, cli.json).await
        }
        BackendMode::Firebase => {
            let repos = firebase_repositories(&config).await?;
            commands::dispatch(&repos, cli.command, cli.json).await
        }
    }
}

/// Config file, then `PHOTONEST_*` variables, then command-line flags
fn load_config(
    path: Option<&Path>,
    cli: &Cli,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, CliError> {
    let mut config = match path {
        Some(path) if path.exists() => AppConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        _ => AppConfig::default(),
    }
    .with_overrides(lookup)?;

    if let Some(backend) = cli.backend {
        config.backend = match backend {
            BackendArg::Firebase => BackendMode::Firebase,
            BackendArg::Memory => BackendMode::Memory,
        };
    }
    if let Some(path) = &cli.cache_path {
        config.cache_path = Some(path.clone());
    }
    Ok(config.validated()?)
}

async fn firebase_repositories(
    config: &AppConfig,
) -> Result<Repositories<FirebaseAuthClient<KeychainSessionStore>, FirestoreDocumentStore, S3MediaStorage>, CliError>
{
    let firebase = config
        .firebase
        .as_ref()
        .ok_or_else(|| CliError::Config("Firebase project is not configured".to_string()))?;
    let media = config.media.clone().ok_or_else(|| {
        CliError::Config(
            "Media storage is not configured. Set PHOTONEST_S3_BUCKET and its credentials."
                .to_string(),
        )
    })?;

    let session = SessionHandle::new();
    let store = match &firebase.firestore_url {
        Some(url) => FirestoreDocumentStore::with_base_url(url, &firebase.project_id, session.clone())?,
        None => FirestoreDocumentStore::new(&firebase.project_id, session.clone())?,
    };
    let endpoints = firebase
        .auth_url
        .as_deref()
        .map_or_else(FirebaseAuthEndpoints::default, FirebaseAuthEndpoints::single);
    let auth = FirebaseAuthClient::with_endpoints(
        firebase.api_key.clone(),
        endpoints,
        KeychainSessionStore::new(&firebase.project_id),
    )
    .map_err(photonest_core::Error::from)?;

    let cache_path = match &config.cache_path {
        Some(path) => path.clone(),
        None => default_cache_path()
            .ok_or_else(|| CliError::Config("No data directory for the local cache".to_string()))?,
    };

    Ok(Repositories::new(
        auth,
        store,
        S3MediaStorage::new(media)?,
        LocalCache::open_path(cache_path).await?,
        session,
        otp_client(config)?,
    ))
}

fn otp_client(config: &AppConfig) -> Result<Option<OtpClient>, CliError> {
    config
        .otp_base_url
        .as_deref()
        .map(OtpClient::new)
        .transpose()
        .map_err(|error| CliError::Core(error.into()))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("photonest").join(CONFIG_FILE_NAME))
}

fn default_cache_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("photonest").join(CACHE_FILE_NAME))
}
