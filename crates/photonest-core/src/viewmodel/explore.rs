//! Explore screen: trending content, category filter and search

use super::{alert_for, find_post, StateHolder};
use crate::auth::AuthProvider;
use crate::models::{Category, Post, PostId, User};
use crate::remote::DocumentStore;
use crate::repository::{Repositories, PAGE_SIZE};
use crate::resource::Resource;
use crate::storage::MediaStorage;

const TRENDING_CATEGORIES: usize = 20;
const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreUiState {
    /// Trending posts, or the selected category's posts
    pub posts: Resource<Vec<Post>>,
    pub categories: Resource<Vec<Category>>,
    pub selected_category: Option<String>,
    pub query: String,
    /// `None` until a search runs
    pub users: Option<Resource<Vec<User>>>,
    /// Filled when the query is a `#tag`
    pub tagged: Option<Resource<Vec<Post>>>,
    pub alert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExploreEvent {
    Load,
    SelectCategory(Option<String>),
    QueryChanged(String),
    Search,
    ToggleLike(PostId),
    DismissAlert,
}

pub struct ExploreViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    viewer: User,
    state: StateHolder<ExploreUiState>,
}

impl<A, D, M> ExploreViewModel<A, D, M>
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

    pub fn state(&self) -> ExploreUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<ExploreUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: ExploreEvent) {
        match event {
            ExploreEvent::Load => {
                let selected = self.state.get().selected_category;
                self.load_categories().await;
                self.load_posts(selected).await;
            }
            ExploreEvent::SelectCategory(category) => self.load_posts(category).await,
            ExploreEvent::QueryChanged(query) => self.state.update(|state| {
                if query.trim().is_empty() {
                    state.users = None;
                    state.tagged = None;
                }
                state.query = query;
            }),
            ExploreEvent::Search => self.search().await,
            ExploreEvent::ToggleLike(id) => self.toggle_like(id).await,
            ExploreEvent::DismissAlert => self.state.update(|state| state.alert = None),
        }
    }

    async fn load_categories(&self) {
        self.state.update(|state| state.categories = Resource::Loading);
        let result = self.repos.posts.trending_categories(TRENDING_CATEGORIES).await;
        self.state.update(|state| state.categories = result.into());
    }

    async fn load_posts(&self, category: Option<String>) {
        self.state.update(|state| {
            state.posts = Resource::Loading;
            state.selected_category.clone_from(&category);
        });
        let result = match &category {
            Some(name) => {
                self.repos
                    .posts
                    .category_posts(&self.viewer.id, name, PAGE_SIZE)
                    .await
            }
            None => self.repos.posts.trending_posts(&self.viewer.id, PAGE_SIZE).await,
        };
        self.state.update(|state| {
            // a newer selection may have landed meanwhile
            if state.selected_category == category {
                state.posts = result.into();
            }
        });
    }

    async fn search(&self) {
        let query = self.state.get().query.trim().to_string();
        if query.is_empty() {
            self.state.update(|state| {
                state.users = None;
                state.tagged = None;
            });
            return;
        }

        if query.starts_with('#') {
            self.state.update(|state| {
                state.users = None;
                state.tagged = Some(Resource::Loading);
            });
            let result = self
                .repos
                .posts
                .tagged_posts(&self.viewer.id, &query, PAGE_SIZE)
                .await;
            self.state.update(|state| state.tagged = Some(result.into()));
        } else {
            self.state.update(|state| {
                state.tagged = None;
                state.users = Some(Resource::Loading);
            });
            let result = self.repos.users.search_users(&query, SEARCH_LIMIT).await;
            self.state.update(|state| state.users = Some(result.into()));
        }
    }

    async fn toggle_like(&self, id: PostId) {
        let mut previous = None;
        self.state.update(|state| {
            if let Some(post) = state.posts.data_mut().and_then(|posts| find_post(posts, &id)) {
                previous = Some(post.clone());
                post.apply_like_toggle();
            }
        });
        let Some(previous) = previous else {
            return;
        };

        let result = self.repos.posts.toggle_like(&self.viewer, &id).await;
        self.state.update(|state| {
            let Some(post) = state.posts.data_mut().and_then(|posts| find_post(posts, &id)) else {
                return;
            };
            match result {
                Ok(updated) => *post = updated,
                Err(error) => {
                    *post = previous;
                    state.alert = Some(alert_for("like", &error));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostDraft;
    use crate::repository::testing::Harness;
    use pretty_assertions::assert_eq;

    async fn seeded() -> (Harness, User) {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        h.seed_user("alina-id", "alina", false).await;
        h.seed_user("bob-id", "bob", false).await;
        let drafts = [
            ("Sunset #beach", Some("travel")),
            ("Noodles", Some("food")),
            ("Harbour #beach", Some("travel")),
        ];
        for (caption, category) in drafts {
            let draft = PostDraft::new(caption, category, vec![1], "p.jpg", "image/jpeg").unwrap();
            h.repos.posts.create_post(&alice, draft).await.unwrap();
        }
        (h, alice)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_and_filter_by_category() {
        let (h, alice) = seeded().await;
        let vm = ExploreViewModel::new(h.repos.clone(), alice);

        vm.on_event(ExploreEvent::Load).await;
        let state = vm.state();
        assert_eq!(state.posts.data().map(Vec::len), Some(3));
        let names: Vec<String> = state
            .categories
            .data()
            .unwrap()
            .iter()
            .map(|category| category.name.clone())
            .collect();
        assert_eq!(names, vec!["travel".to_string(), "food".to_string()]);

        vm.on_event(ExploreEvent::SelectCategory(Some("travel".to_string())))
            .await;
        let state = vm.state();
        assert_eq!(state.selected_category.as_deref(), Some("travel"));
        assert_eq!(state.posts.data().map(Vec::len), Some(2));

        vm.on_event(ExploreEvent::SelectCategory(None)).await;
        assert_eq!(vm.state().posts.data().map(Vec::len), Some(3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_users_and_tags() {
        let (h, alice) = seeded().await;
        let vm = ExploreViewModel::new(h.repos.clone(), alice);

        vm.on_event(ExploreEvent::QueryChanged("ali".to_string())).await;
        vm.on_event(ExploreEvent::Search).await;
        let users = vm.state().users.unwrap().into_data().unwrap();
        let handles: Vec<&str> = users.iter().map(|user| user.username.as_str()).collect();
        assert_eq!(handles, vec!["alice", "alina"]);

        vm.on_event(ExploreEvent::QueryChanged("#Beach".to_string())).await;
        vm.on_event(ExploreEvent::Search).await;
        let state = vm.state();
        assert_eq!(state.users, None);
        assert_eq!(state.tagged.unwrap().data().map(Vec::len), Some(2));

        vm.on_event(ExploreEvent::QueryChanged("  ".to_string())).await;
        let state = vm.state();
        assert_eq!(state.users, None);
        assert_eq!(state.tagged, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_with_empty_cache_shows_error() {
        let h = Harness::new().await;
        let alice = h.seed_user("alice-id", "alice", false).await;
        h.offline(true);
        let vm = ExploreViewModel::new(h.repos.clone(), alice);
        vm.on_event(ExploreEvent::Load).await;
        let state = vm.state();
        assert!(state.posts.error_message().is_some());
        assert!(state.categories.error_message().is_some());
    }
}
