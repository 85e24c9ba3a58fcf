use photonest_core::auth::AuthProvider;
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;
use photonest_core::viewmodel::{ExploreEvent, ExploreViewModel};

use crate::cli::ExploreCommands;
use crate::commands::common::{format_category_line, print_json, print_posts, resolved, signed_in_user};
use crate::error::CliError;

pub async fn run_explore<A, D, M>(
    repos: &Repositories<A, D, M>,
    command: ExploreCommands,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    match command {
        ExploreCommands::Trending { limit } => {
            let viewer = signed_in_user(repos).await?;
            let vm = ExploreViewModel::new(repos.clone(), viewer);
            vm.on_event(ExploreEvent::SelectCategory(None)).await;
            let mut posts = resolved(vm.state().posts)?;
            posts.truncate(limit);
            print_posts(&posts, as_json)
        }
        ExploreCommands::Categories { limit } => {
            let categories = repos.posts.trending_categories(limit).await?;
            if as_json {
                return print_json(&categories);
            }
            if categories.is_empty() {
                println!("No categories yet.");
            }
            for category in &categories {
                println!("{}", format_category_line(category));
            }
            Ok(())
        }
        ExploreCommands::Category { name, limit } => {
            let viewer = signed_in_user(repos).await?;
            let vm = ExploreViewModel::new(repos.clone(), viewer);
            vm.on_event(ExploreEvent::SelectCategory(Some(name))).await;
            let mut posts = resolved(vm.state().posts)?;
            posts.truncate(limit);
            print_posts(&posts, as_json)
        }
    }
}
