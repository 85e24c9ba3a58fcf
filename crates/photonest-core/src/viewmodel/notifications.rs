//! Activity screen: notifications and pending follow requests

use super::{alert_for, StateHolder};
use crate::auth::AuthProvider;
use crate::models::{Notification, NotificationId, User, UserId};
use crate::remote::DocumentStore;
use crate::repository::Repositories;
use crate::resource::Resource;
use crate::storage::MediaStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationsUiState {
    pub notifications: Resource<Vec<Notification>>,
    pub unread: usize,
    /// Accounts waiting for the viewer to accept them
    pub requests: Resource<Vec<User>>,
    pub alert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationsEvent {
    Load,
    MarkRead(NotificationId),
    MarkAllRead,
    Delete(NotificationId),
    AcceptRequest(UserId),
    DeclineRequest(UserId),
    DismissAlert,
}

pub struct NotificationsViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    viewer: User,
    state: StateHolder<NotificationsUiState>,
}

impl<A, D, M> NotificationsViewModel<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(repos: Repositories<A, D, M>, viewer: User) -> Self {
        Self {
            repos,
            viewer,
            state: StateHolder::default(),
        }
    }

    pub fn state(&self) -> NotificationsUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<NotificationsUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: NotificationsEvent) {
        match event {
            NotificationsEvent::Load => self.load().await,
            NotificationsEvent::MarkRead(id) => self.mark_read(id).await,
            NotificationsEvent::MarkAllRead => self.mark_all_read().await,
            NotificationsEvent::Delete(id) => self.delete(id).await,
            NotificationsEvent::AcceptRequest(follower) => self.answer(follower, true).await,
            NotificationsEvent::DeclineRequest(follower) => self.answer(follower, false).await,
            NotificationsEvent::DismissAlert => self.state.update(|state| state.alert = None),
        }
    }

    async fn load(&self) {
        self.state.update(|state| {
            state.notifications = Resource::Loading;
            state.requests = Resource::Loading;
        });
        let notifications = self.repos.notifications.inbox(&self.viewer.id).await;
        let requests = self.repos.users.pending_requests(&self.viewer.id).await;
        // the inbox holds one page; the badge counts every unread item
        let unread = match self.repos.notifications.unread_count(&self.viewer.id).await {
            Ok(count) => Some(count),
            Err(error) => {
                tracing::debug!("Unread count unavailable: {}", error);
                notifications.as_ref().ok().map(|items| unread_in(items))
            }
        };
        self.state.update(|state| {
            if let Some(unread) = unread {
                state.unread = unread;
            }
            state.notifications = notifications.into();
            state.requests = requests.into();
        });
    }

    async fn mark_read(&self, id: NotificationId) {
        let mut changed = false;
        self.state.update(|state| {
            if let Some(item) = state
                .notifications
                .data_mut()
                .and_then(|items| items.iter_mut().find(|item| item.id == id))
            {
                if !item.is_read {
                    item.is_read = true;
                    state.unread = state.unread.saturating_sub(1);
                    changed = true;
                }
            }
        });
        if !changed {
            return;
        }

        if let Err(error) = self.repos.notifications.mark_read(&id).await {
            self.state.update(|state| {
                if let Some(item) = state
                    .notifications
                    .data_mut()
                    .and_then(|items| items.iter_mut().find(|item| item.id == id))
                {
                    item.is_read = false;
                    state.unread += 1;
                }
                state.alert = Some(alert_for("mark read", &error));
            });
        }
    }

    async fn mark_all_read(&self) {
        match self.repos.notifications.mark_all_read(&self.viewer.id).await {
            Ok(()) => self.state.update(|state| {
                if let Some(items) = state.notifications.data_mut() {
                    for item in items.iter_mut() {
                        item.is_read = true;
                    }
                }
                state.unread = 0;
            }),
            Err(error) => self
                .state
                .update(|state| state.alert = Some(alert_for("mark all read", &error))),
        }
    }

    async fn delete(&self, id: NotificationId) {
        match self.repos.notifications.delete(&id).await {
            Ok(()) => {
                let unread = self.repos.notifications.unread_count(&self.viewer.id).await;
                self.state.update(|state| {
                    let mut removed_unread = false;
                    if let Some(items) = state.notifications.data_mut() {
                        removed_unread = items.iter().any(|item| item.id == id && !item.is_read);
                        items.retain(|item| item.id != id);
                    }
                    state.unread = match unread {
                        Ok(count) => count,
                        Err(_) if removed_unread => state.unread.saturating_sub(1),
                        Err(_) => state.unread,
                    };
                });
            }
            Err(error) => self
                .state
                .update(|state| state.alert = Some(alert_for("delete notification", &error))),
        }
    }

    async fn answer(&self, follower: UserId, accept: bool) {
        let result = if accept {
            self.repos.users.accept_request(&self.viewer, &follower).await
        } else {
            self.repos
                .users
                .decline_request(&self.viewer.id, &follower)
                .await
        };
        self.state.update(|state| match result {
            Ok(()) => {
                if let Some(requests) = state.requests.data_mut() {
                    requests.retain(|user| user.id != follower);
                }
            }
            Err(error) => {
                let action = if accept { "accept request" } else { "decline request" };
                state.alert = Some(alert_for(action, &error));
            }
        });
    }
}

fn unread_in(items: &[Notification]) -> usize {
    items.iter().filter(|item| !item.is_read).count()
}
