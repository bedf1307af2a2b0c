//! Generic list view over a backend collection: fetching, pagination,
//! filtering, sorting and optimistic writes.

use super::debounce::Debouncer;
use super::filters::Filters;
use super::list_controls::ListControls;
use crate::session::SessionStore;
use crate::state::{Page, QueryCache, QueryKey, Row, Snapshot};
use crate::toast::Toasts;
use payloads::{APIClient, ClientError, ListQuery, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A backend collection the dashboard manages.
pub trait Resource: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Path of the collection, e.g. `events`.
    const ENDPOINT: &'static str;
    const DEFAULT_SORT: &'static str;

    type Entity: Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Body of a create request, shown as a placeholder row until confirmed.
    type Draft: Debug + Clone + PartialEq + Serialize + Send + Sync + 'static;
    type Filters: Filters;

    fn id(entity: &Self::Entity) -> &str;

    fn created_message(entity: &Self::Entity) -> String;
    fn edited_message(entity: &Self::Entity) -> String;
    fn deleted_message() -> String;

    /// Reshape a server response into the form list rows hold.
    fn to_row(entity: Self::Entity) -> Self::Entity {
        entity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error(String),
}

/// How a write ended. A rolled back write left the cache as it was before.
#[derive(Debug)]
pub enum MutationOutcome<T> {
    Committed(T),
    RolledBack(ClientError),
}

impl<T> MutationOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            Self::Committed(value) => Some(value),
            Self::RolledBack(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Committed(_) => None,
            Self::RolledBack(e) => Some(e),
        }
    }
}

/// An optimistic write applied to the cache, awaiting the server.
#[must_use]
struct Pending<R: Resource> {
    cache: QueryCache<R>,
    key: QueryKey,
    snapshot: Snapshot<R>,
    /// Whether `key` had a page to apply the edit to.
    applied: bool,
}

impl<R: Resource> Pending<R> {
    /// Cancel in-flight fetches, snapshot `key` and apply the edits.
    fn apply(
        cache: &QueryCache<R>,
        key: &QueryKey,
        page: impl FnOnce(&mut Page<R>),
        total: impl FnOnce(u64) -> u64,
    ) -> Self {
        cache.cancel();
        let snapshot = cache.snapshot(key);
        let applied = cache.update_page(key, page);
        cache.update_total(total);
        Self {
            cache: cache.clone(),
            key: key.clone(),
            snapshot,
            applied,
        }
    }

    /// A page that wasn't loaded when the write started can't reflect it, so
    /// any fetch of it still in flight is dropped and it is fetched again.
    fn commit<T>(self, value: T) -> MutationOutcome<T> {
        if !self.applied {
            self.cache.cancel();
            self.cache.mark_stale(&self.key);
        }
        MutationOutcome::Committed(value)
    }

    fn rollback<T>(self, error: ClientError) -> MutationOutcome<T> {
        self.cache.restore(self.snapshot);
        MutationOutcome::RolledBack(error)
    }
}

/// Surface a failed request: toast it, and drop the session if the server
/// rejected our credentials.
pub(crate) fn report_failure(toasts: &Toasts, session: &SessionStore, error: &ClientError) {
    toasts.error(error.to_string());
    if error.is_unauthorized() {
        session.logout();
    }
}

/// Handle to the list view of a resource. Clones share state.
pub struct ResourceList<R: Resource> {
    inner: Arc<ListInner<R>>,
}

struct ListInner<R: Resource> {
    client: APIClient,
    session: SessionStore,
    toasts: Toasts,
    cache: QueryCache<R>,
    controls: Mutex<ListControls<R::Filters>>,
    status: Mutex<QueryStatus>,
    debouncer: Debouncer,
}

impl<R: Resource> Clone for ResourceList<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> ResourceList<R> {
    pub fn new(
        client: APIClient,
        session: SessionStore,
        toasts: Toasts,
        cache: QueryCache<R>,
        page_size: u64,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ListInner {
                client,
                session,
                toasts,
                cache,
                controls: Mutex::new(ListControls::new(R::DEFAULT_SORT, page_size)),
                status: Mutex::new(QueryStatus::Idle),
                debouncer: Debouncer::new(debounce),
            }),
        }
    }

    fn controls_mut(&self) -> MutexGuard<'_, ListControls<R::Filters>> {
        self.inner.controls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: QueryStatus) {
        *self.inner.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub(crate) fn client(&self) -> &APIClient {
        &self.inner.client
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.inner.session.token()
    }

    /// Stores a refreshed token in the session.
    pub(crate) fn on_refresh(&self) -> impl FnOnce(&str) + use<R> {
        let session = self.inner.session.clone();
        move |token: &str| session.set_token(token)
    }

    pub(crate) fn report(&self, error: &ClientError) {
        report_failure(&self.inner.toasts, &self.inner.session, error);
    }

    pub fn controls(&self) -> ListControls<R::Filters> {
        self.controls_mut().clone()
    }

    pub fn filters(&self) -> R::Filters {
        self.controls_mut().filters().clone()
    }

    pub fn key(&self) -> QueryKey {
        self.controls_mut().key(R::ENDPOINT)
    }

    pub fn status(&self) -> QueryStatus {
        self.inner.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Rows of the current page, placeholders included.
    pub fn rows(&self) -> Vec<Row<R>> {
        self.inner
            .cache
            .page(&self.key())
            .map(|page| page.rows)
            .unwrap_or_default()
    }

    /// Confirmed records of the current page.
    pub fn entities(&self) -> Vec<R::Entity> {
        self.rows()
            .into_iter()
            .filter_map(|row| match row {
                Row::Stored(entity) => Some(entity),
                Row::Placeholder(_) => None,
            })
            .collect()
    }

    /// Total number of records in the collection, regardless of filters.
    pub fn count(&self) -> u64 {
        self.inner.cache.total().unwrap_or(0)
    }

    /// Number of records matching the current filters.
    pub fn filtered_count(&self) -> u64 {
        self.inner
            .cache
            .page(&self.key())
            .map(|page| page.count)
            .unwrap_or(0)
    }

    pub fn page(&self) -> u64 {
        self.controls_mut().page()
    }

    pub fn limit(&self) -> u64 {
        self.controls_mut().limit()
    }

    pub fn skip(&self) -> u64 {
        self.controls_mut().skip()
    }

    pub fn sort(&self) -> String {
        self.controls_mut().sort().to_string()
    }

    pub fn max_page(&self) -> i64 {
        let count = self.count();
        self.controls_mut().max_page(count)
    }

    pub fn lower_shown(&self) -> u64 {
        self.controls_mut().lower_shown()
    }

    pub fn upper_shown(&self) -> u64 {
        let rows = self.rows().len();
        self.controls_mut().upper_shown(rows)
    }

    pub fn set_filters(&self, filters: R::Filters) {
        self.controls_mut().set_filters(filters);
    }

    pub fn update_filter(&self, change: <R::Filters as Filters>::Change) {
        self.controls_mut().apply(change);
    }

    /// Apply a filter edit once typing settles. Returns whether this edit
    /// was applied; an edit superseded by a newer one is dropped.
    pub async fn handle_filter_change(&self, change: <R::Filters as Filters>::Change) -> bool {
        if !self.inner.debouncer.settle().await {
            return false;
        }
        self.update_filter(change);
        true
    }

    pub fn set_page(&self, page: u64) {
        self.controls_mut().set_page(page);
    }

    pub fn next_page(&self) {
        let count = self.count();
        self.controls_mut().next_page(count);
    }

    pub fn previous_page(&self) {
        self.controls_mut().previous_page();
    }

    pub fn set_limit(&self, limit: u64) {
        self.controls_mut().set_limit(limit);
    }

    pub fn toggle_sort(&self, field: &str) {
        self.controls_mut().toggle_sort(field);
    }

    /// Fetch the current page and the collection total. A fetch cancelled by
    /// a write is repeated while the page has nothing cached.
    #[tracing::instrument(skip(self), fields(resource = R::ENDPOINT))]
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let (key, query) = {
            let controls = self.controls_mut();
            (controls.key(R::ENDPOINT), controls.query())
        };
        self.set_status(QueryStatus::Loading);

        loop {
            match self.fetch_page(&key, &query).await {
                Ok(true) => break,
                Ok(false) if self.inner.cache.page(&key).is_none() => {
                    tracing::debug!("Fetch was cancelled before anything was cached, retrying");
                }
                Ok(false) => {
                    tracing::debug!("Discarded results of a cancelled fetch");
                    break;
                }
                Err(e) => {
                    self.set_status(QueryStatus::Error(e.to_string()));
                    return Err(e);
                }
            }
        }
        self.set_status(QueryStatus::Success);
        Ok(())
    }

    /// One round trip for a page and the total. Returns whether the results
    /// were stored.
    async fn fetch_page(&self, key: &QueryKey, query: &ListQuery) -> Result<bool, ClientError> {
        let ticket = self.inner.cache.begin_fetch();

        let list_request = Request::get(R::ENDPOINT)
            .query(query.clone())
            .token(self.token());
        let count_request = Request::get(format!("{}/count", R::ENDPOINT)).token(self.token());
        let (list, total) = tokio::join!(
            self.inner
                .client
                .crud::<Vec<R::Entity>>(&list_request, self.on_refresh()),
            self.inner
                .client
                .crud::<u64>(&count_request, self.on_refresh()),
        );
        let (list, total) = (list?, total?);

        let page = Page {
            rows: list.data.into_iter().map(R::to_row).map(Row::Stored).collect(),
            count: list.meta.count,
        };
        Ok(self.inner.cache.complete(&ticket, key.clone(), page, total.data))
    }

    /// Fetch only when the current page isn't cached or has gone stale.
    pub async fn ensure_loaded(&self) -> Result<(), ClientError> {
        if self.inner.cache.is_stale(&self.key()) {
            return self.refresh().await;
        }
        self.set_status(QueryStatus::Success);
        Ok(())
    }

    /// Fetch a single record, served from the cache when known.
    pub async fn get(&self, id: &str) -> Result<R::Entity, ClientError> {
        if let Some(entity) = self.inner.cache.detail(id) {
            return Ok(entity);
        }
        let request = Request::get(format!("{}/{id}", R::ENDPOINT)).token(self.token());
        let envelope = self
            .inner
            .client
            .crud::<R::Entity>(&request, self.on_refresh())
            .await?;
        self.inner.cache.set_detail(id, envelope.data.clone());
        Ok(envelope.data)
    }

    fn fail<T>(&self, pending: Pending<R>, error: ClientError) -> MutationOutcome<T> {
        self.report(&error);
        pending.rollback(error)
    }

    /// Create a record. A placeholder row is shown at the end of the current
    /// page until the server answers.
    #[tracing::instrument(skip_all, fields(resource = R::ENDPOINT))]
    pub async fn add(&self, draft: R::Draft) -> MutationOutcome<R::Entity> {
        let key = self.key();
        let pending = Pending::apply(
            &self.inner.cache,
            &key,
            |page| {
                page.rows.push(Row::Placeholder(draft.clone()));
                page.count += 1;
            },
            |total| total + 1,
        );

        let request = match Request::post(R::ENDPOINT, &draft) {
            Ok(request) => request.token(self.token()),
            Err(e) => return self.fail(pending, e),
        };
        match self
            .inner
            .client
            .crud::<R::Entity>(&request, self.on_refresh())
            .await
        {
            Ok(envelope) => {
                let created = envelope.data;
                let stored = R::to_row(created.clone());
                self.inner.cache.update_page(&key, |page| {
                    if let Some(slot) = page.rows.iter_mut().find(|row| row.is_placeholder()) {
                        *slot = Row::Stored(stored);
                    }
                });
                self.inner.cache.invalidate_others(&key);
                self.inner.toasts.success(R::created_message(&created));
                pending.commit(created)
            }
            Err(e) => self.fail(pending, e),
        }
    }

    /// Update a record, replacing its row right away.
    #[tracing::instrument(skip_all, fields(resource = R::ENDPOINT, id = R::id(&entity)))]
    pub async fn edit(&self, entity: R::Entity) -> MutationOutcome<R::Entity> {
        let key = self.key();
        let id = R::id(&entity).to_string();
        let pending = Pending::apply(
            &self.inner.cache,
            &key,
            |page| replace_row(page, &id, entity.clone()),
            |total| total,
        );

        let request = match Request::put(format!("{}/{id}", R::ENDPOINT), &entity) {
            Ok(request) => request.token(self.token()),
            Err(e) => return self.fail(pending, e),
        };
        match self
            .inner
            .client
            .crud::<R::Entity>(&request, self.on_refresh())
            .await
        {
            Ok(envelope) => {
                let saved = envelope.data;
                let row = R::to_row(saved.clone());
                self.inner
                    .cache
                    .update_page(&key, |page| replace_row(page, &id, row));
                self.inner.cache.set_detail(id.as_str(), saved.clone());
                self.inner.cache.invalidate_others(&key);
                self.inner.toasts.success(R::edited_message(&saved));
                pending.commit(saved)
            }
            Err(e) => self.fail(pending, e),
        }
    }

    /// Delete a record, removing its row right away.
    #[tracing::instrument(skip(self), fields(resource = R::ENDPOINT))]
    pub async fn delete(&self, id: &str) -> MutationOutcome<()> {
        let key = self.key();
        let pending = Pending::apply(
            &self.inner.cache,
            &key,
            |page| {
                let before = page.rows.len();
                page.rows.retain(|row| row.id() != Some(id));
                if page.rows.len() < before {
                    page.count = page.count.saturating_sub(1);
                }
            },
            |total| total.saturating_sub(1),
        );

        let request = Request::delete(format!("{}/{id}", R::ENDPOINT)).token(self.token());
        match self
            .inner
            .client
            .crud::<serde_json::Value>(&request, self.on_refresh())
            .await
        {
            Ok(_) => {
                self.inner.cache.remove_detail(id);
                self.inner.cache.invalidate_others(&key);
                self.inner.toasts.success(R::deleted_message());
                pending.commit(())
            }
            Err(e) => self.fail(pending, e),
        }
    }
}

fn replace_row<R: Resource>(page: &mut Page<R>, id: &str, entity: R::Entity) {
    if let Some(slot) = page.rows.iter_mut().find(|row| row.id() == Some(id)) {
        *slot = Row::Stored(entity);
    }
}
