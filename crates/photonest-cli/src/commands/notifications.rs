use chrono::Utc;
use photonest_core::auth::AuthProvider;
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;
use photonest_core::viewmodel::{NotificationsEvent, NotificationsViewModel};

use crate::cli::NotificationCommands;
use crate::commands::common::{
    format_notification_line, print_json, resolved, signed_in_user, user_to_list_item,
};
use crate::error::CliError;

pub async fn run_notifications<A, D, M>(
    repos: &Repositories<A, D, M>,
    command: NotificationCommands,
    as_json: bool,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    let viewer = signed_in_user(repos).await?;
    let vm = NotificationsViewModel::new(repos.clone(), viewer);
    vm.on_event(NotificationsEvent::Load).await;

    match command {
        NotificationCommands::List => {
            let state = vm.state();
            let notifications = resolved(state.notifications)?;
            let requests = resolved(state.requests).unwrap_or_default();

            if as_json {
                return print_json(&serde_json::json!({
                    "unread": state.unread,
                    "notifications": notifications,
                    "requests": requests.iter().map(user_to_list_item).collect::<Vec<_>>(),
                }));
            }
            if !requests.is_empty() {
                println!("Follow requests:");
                for user in &requests {
                    println!("  @{}", user.username);
                }
                println!();
            }
            if notifications.is_empty() {
                println!("No notifications yet.");
            }
            let now_ms = Utc::now().timestamp_millis();
            for notification in &notifications {
                println!("{}", format_notification_line(notification, now_ms));
            }
            Ok(())
        }
        NotificationCommands::ReadAll => {
            vm.on_event(NotificationsEvent::MarkAllRead).await;
            if let Some(alert) = vm.state().alert {
                return Err(CliError::Screen(alert));
            }
            println!("All notifications marked as read");
            Ok(())
        }
    }
}
