pub mod auth_cmd;
pub mod common;
pub mod demo;
pub mod explore;
pub mod notifications;
pub mod post;
pub mod user;

use photonest_core::auth::AuthProvider;
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;

use crate::cli::Commands;
use crate::error::CliError;

/// Run one command against an assembled backend
pub async fn dispatch<A, D, M>(
    repos: &Repositories<A, D, M>,
    command: Commands,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    match command {
        Commands::Auth { command } => auth_cmd::run_auth(repos, command).await,
        Commands::Feed { limit } => post::run_feed(repos, limit, as_json).await,
        Commands::Post { command } => post::run_post(repos, command, as_json).await,
        Commands::Explore { command } => explore::run_explore(repos, command, as_json).await,
        Commands::User { command } => user::run_user(repos, command, as_json).await,
        Commands::Notifications { command } => {
            notifications::run_notifications(repos, command, as_json).await
        }
        Commands::Demo => demo::run_demo().await,
    }
}
