use std::path::{Path, PathBuf};

use clap::Parser;
use photonest_core::auth::{InMemoryAuthProvider, SessionHandle};
use photonest_core::config::BackendMode;
use photonest_core::db::LocalCache;
use photonest_core::models::PostId;
use photonest_core::otp::OtpClient;
use photonest_core::remote::InMemoryDocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::InMemoryMediaStorage;
use pretty_assertions::assert_eq;

use crate::cli::{AuthCommands, Cli, Commands, PostCommands, UserCommands};
use crate::commands::common::{
    content_type_for, format_relative_time, parse_id, preview, signed_in_user,
};
use crate::commands::dispatch;
use crate::error::CliError;
use crate::load_config;

type MemoryRepositories =
    Repositories<InMemoryAuthProvider, InMemoryDocumentStore, InMemoryMediaStorage>;

async fn memory_repos() -> MemoryRepositories {
    Repositories::new(
        InMemoryAuthProvider::new(),
        InMemoryDocumentStore::new(),
        InMemoryMediaStorage::new(),
        LocalCache::open_in_memory().await.unwrap(),
        SessionHandle::new(),
        None,
    )
}

fn signup(email: &str, username: &str) -> Commands {
    Commands::Auth {
        command: AuthCommands::Signup {
            email: email.to_string(),
            password: "secret-pass".to_string(),
            username: username.to_string(),
            full_name: String::new(),
            code: None,
        },
    }
}

#[test]
fn parses_nested_commands_and_global_flags() {
    let cli = Cli::try_parse_from([
        "photonest",
        "post",
        "comment",
        "0190c3b2-6d1e-7000-8000-000000000001",
        "so",
        "good",
        "--json",
    ])
    .unwrap();
    assert!(cli.json);
    match cli.command {
        Commands::Post {
            command: PostCommands::Comment { text, reply_to, .. },
        } => {
            assert_eq!(text, vec!["so".to_string(), "good".to_string()]);
            assert_eq!(reply_to, None);
        }
        _ => panic!("expected post comment"),
    }

    let cli = Cli::try_parse_from(["photonest", "--backend", "memory", "user", "show"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::User {
            command: UserCommands::Show { username: None }
        }
    ));
}

#[test]
fn flags_override_environment() {
    let cli = Cli::try_parse_from([
        "photonest",
        "--backend",
        "memory",
        "--cache-path",
        "/tmp/pn.db",
        "feed",
    ])
    .unwrap();
    let config = load_config(None, &cli, |key| match key {
        "PHOTONEST_BACKEND" => Some("firebase".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.backend, BackendMode::Memory);
    assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/pn.db")));
}

#[test]
fn incomplete_firebase_config_is_rejected() {
    let cli = Cli::try_parse_from(["photonest", "feed"]).unwrap();
    let error = load_config(None, &cli, |key| match key {
        "PHOTONEST_FIREBASE_PROJECT_ID" => Some("demo-project".to_string()),
        _ => None,
    })
    .unwrap_err();
    assert!(error.to_string().contains("PHOTONEST_FIREBASE_API_KEY"));
}

#[test]
fn config_file_is_read_when_present() {
    let dir = std::env::temp_dir().join(format!("photonest-cli-{}", PostId::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(
        &path,
        r#"{"backend": "firebase", "firebase": {"project_id": "p", "api_key": "k"}}"#,
    )
    .unwrap();

    let cli = Cli::try_parse_from(["photonest", "feed"]).unwrap();
    let config = load_config(Some(&path), &cli, |_| None).unwrap();
    assert_eq!(config.backend, BackendMode::Firebase);
    assert_eq!(config.firebase.unwrap().project_id, "p");
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn image_types_follow_extension() {
    assert_eq!(content_type_for(Path::new("a/b/photo.JPG")).unwrap(), "image/jpeg");
    assert_eq!(content_type_for(Path::new("shot.png")).unwrap(), "image/png");
    assert!(matches!(
        content_type_for(Path::new("notes.txt")),
        Err(CliError::UnsupportedImage(_))
    ));
}

#[test]
fn ids_must_be_uuids() {
    let id: PostId = parse_id("post", " 0190c3b2-6d1e-7000-8000-000000000001 ").unwrap();
    assert_eq!(id.to_string(), "0190c3b2-6d1e-7000-8000-000000000001");
    let error = parse_id::<PostId>("post", "nope").unwrap_err();
    assert_eq!(error.to_string(), "Invalid post id: nope");
}

#[test]
fn relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn preview_collapses_and_truncates() {
    assert_eq!(preview("  golden   hour\nsecond line", 40), "golden hour");
    assert_eq!(preview(&"a".repeat(50), 10), "aaaaaaa...");
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_need_a_session() {
    let repos = memory_repos().await;
    let error = dispatch(&repos, Commands::Feed { limit: 5 }, false)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::NotSignedIn));
}

#[tokio::test(flavor = "multi_thread")]
async fn signup_follow_and_logout() {
    let repos = memory_repos().await;
    dispatch(&repos, signup("bo@example.com", "bo_h"), false)
        .await
        .unwrap();
    dispatch(&repos, signup("ana@example.com", "ana"), false)
        .await
        .unwrap();
    assert_eq!(signed_in_user(&repos).await.unwrap().username, "ana");

    let follow = Commands::User {
        command: UserCommands::Follow {
            username: "@bo_h".to_string(),
        },
    };
    dispatch(&repos, follow, false).await.unwrap();
    let ana = signed_in_user(&repos).await.unwrap();
    assert_eq!(ana.following_count, 1);

    let missing = Commands::User {
        command: UserCommands::Follow {
            username: "ghost".to_string(),
        },
    };
    let error = dispatch(&repos, missing, false).await.unwrap_err();
    assert_eq!(error.to_string(), "No user named @ghost");

    dispatch(
        &repos,
        Commands::Auth {
            command: AuthCommands::Logout,
        },
        false,
    )
    .await
    .unwrap();
    assert!(matches!(
        signed_in_user(&repos).await,
        Err(CliError::NotSignedIn)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn signup_validation_errors_surface() {
    let repos = memory_repos().await;
    let error = dispatch(&repos, signup("not-an-email", "x"), false)
        .await
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("Enter a valid email address"));
    assert!(message.contains("Username"));
}

#[tokio::test(flavor = "multi_thread")]
async fn signup_needs_a_code_when_otp_is_configured() {
    let repos = Repositories::new(
        InMemoryAuthProvider::new(),
        InMemoryDocumentStore::new(),
        InMemoryMediaStorage::new(),
        LocalCache::open_in_memory().await.unwrap(),
        SessionHandle::new(),
        Some(OtpClient::new("http://127.0.0.1:9").unwrap()),
    );
    let error = dispatch(&repos, signup("bo@example.com", "bo_h"), false)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Verify your email"));
    assert!(matches!(
        signed_in_user(&repos).await,
        Err(CliError::NotSignedIn)
    ));
}
