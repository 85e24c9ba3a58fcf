use photonest_core::auth::AuthProvider;
use photonest_core::models::FollowStatus;
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;
use photonest_core::viewmodel::{ProfileEvent, ProfileViewModel};

use crate::cli::UserCommands;
use crate::commands::common::{
    format_user_line, print_json, print_posts, print_users, resolved, signed_in_user,
    user_by_username, user_to_list_item,
};
use crate::error::CliError;

pub async fn run_user<A, D, M>(
    repos: &Repositories<A, D, M>,
    command: UserCommands,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let viewer = signed_in_user(repos).await?;
    match command {
        UserCommands::Show { username } => {
            let target = match username {
                Some(username) => user_by_username(repos, &username).await?.id,
                None => viewer.id.clone(),
            };
            let vm = ProfileViewModel::new(repos.clone(), viewer, target);
            vm.on_event(ProfileEvent::Load).await;
            let state = vm.state();
            let user = resolved(state.user)?;
            let posts = resolved(state.posts)?;

            if as_json {
                return print_json(&serde_json::json!({
                    "user": user_to_list_item(&user),
                    "followStatus": status_label(state.follow_status),
                    "locked": state.is_locked,
                    "posts": posts.len(),
                }));
            }
            println!("{}", format_user_line(&user));
            if !user.bio.is_empty() {
                println!("{}", user.bio);
            }
            if !state.is_self {
                println!("You: {}", status_label(state.follow_status));
            }
            if state.is_locked {
                println!("This account is private.");
                return Ok(());
            }
            println!();
            print_posts(&posts, false)
        }
        UserCommands::Search { prefix, limit } => {
            let users = repos.users.search_users(&prefix, limit).await?;
            if users.is_empty() && !as_json {
                println!("No users match '{}'.", prefix.trim());
                return Ok(());
            }
            print_users(&users, as_json)
        }
        UserCommands::Follow { username } => {
            let target = user_by_username(repos, &username).await?;
            let status = repos.users.follow(&viewer, &target.id).await?;
            match status {
                FollowStatus::Requested => println!("Requested to follow @{}", target.username),
                _ => println!("Following @{}", target.username),
            }
            Ok(())
        }
        UserCommands::Unfollow { username } => {
            let target = user_by_username(repos, &username).await?;
            repos.users.unfollow(&viewer.id, &target.id).await?;
            println!("Unfollowed @{}", target.username);
            Ok(())
        }
    }
}

const fn status_label(status: FollowStatus) -> &'static str {
    match status {
        FollowStatus::NotFollowing => "not following",
        FollowStatus::Requested => "requested",
        FollowStatus::Following => "following",
    }
}
