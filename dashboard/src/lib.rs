//! Client core of the Cartelera Cultural de Ensenada admin dashboard.
//!
//! [`Dashboard`] wires the API client, the persisted session, the toast
//! queue and one query cache per resource together. Views borrow handles
//! from it: [`Dashboard::events`], [`Dashboard::auth`] and so on.

pub mod auth;
pub mod config;
pub mod hooks;
pub mod logs;
pub mod session;
pub mod state;
pub mod toast;

pub use auth::{Auth, AuthError};
pub use config::Config;
pub use session::{Access, AuthState, FileStorage, MemoryStorage, SessionStorage, SessionStore};
pub use toast::{Toast, ToastType, Toasts};

use hooks::{Categories, EventDetail, Events, Resource, ResourceList, Users};
use payloads::{APIClient, EventId};
use state::QueryCache;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub client: APIClient,
    pub session: SessionStore,
    pub toasts: Toasts,
    pub config: Config,
    events: QueryCache<Events>,
    categories: QueryCache<Categories>,
    users: QueryCache<Users>,
}

impl Dashboard {
    pub fn new(config: Config, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            client: APIClient::new(config.api_url.as_str()),
            session: SessionStore::rehydrate(storage),
            toasts: Toasts::new(),
            config,
            events: QueryCache::new(),
            categories: QueryCache::new(),
            users: QueryCache::new(),
        }
    }

    /// Configure from the environment and persist the session on disk.
    pub fn from_env() -> Self {
        let config = Config::from_env();
        let storage = Arc::new(FileStorage::new(&config.session_dir));
        Self::new(config, storage)
    }

    pub fn auth(&self) -> Auth {
        Auth::new(self.client.clone(), self.session.clone(), self.toasts.clone())
    }

    pub fn events(&self) -> ResourceList<Events> {
        self.list(self.events.clone())
    }

    pub fn categories(&self) -> ResourceList<Categories> {
        self.list(self.categories.clone())
    }

    pub fn users(&self) -> ResourceList<Users> {
        self.list(self.users.clone())
    }

    pub fn event(&self, id: EventId) -> EventDetail {
        EventDetail::new(
            id,
            self.client.clone(),
            self.session.clone(),
            self.toasts.clone(),
            self.events.clone(),
        )
    }

    /// Log out and forget everything fetched under the old session.
    pub fn logout(&self) -> bool {
        let was_logged_in = self.auth().logout();
        self.events.clear();
        self.categories.clear();
        self.users.clear();
        was_logged_in
    }

    fn list<R: Resource>(&self, cache: QueryCache<R>) -> ResourceList<R> {
        ResourceList::new(
            self.client.clone(),
            self.session.clone(),
            self.toasts.clone(),
            cache,
            self.config.page_size,
            self.config.debounce,
        )
    }
}
