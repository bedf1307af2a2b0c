//! Query cache shared by the list and detail views of a resource.
//!
//! Pages are keyed by everything that shapes a list request, so switching
//! back to a filter combination seen before shows its rows immediately.

use crate::hooks::Resource;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Identity of one list request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub resource: &'static str,
    /// Filters in canonical JSON form.
    pub filters: String,
    pub limit: u64,
    pub skip: u64,
    pub sort: String,
}

impl QueryKey {
    pub fn new(
        resource: &'static str,
        filters: &impl Serialize,
        limit: u64,
        skip: u64,
        sort: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            filters: serde_json::to_value(filters)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            limit,
            skip,
            sort: sort.into(),
        }
    }
}

/// A list row. Placeholders stand in for records the server hasn't
/// confirmed yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Row<R: Resource> {
    Placeholder(R::Draft),
    Stored(R::Entity),
}

impl<R: Resource> Row<R> {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Stored(entity) => Some(R::id(entity)),
            Self::Placeholder(_) => None,
        }
    }

    pub fn entity(&self) -> Option<&R::Entity> {
        match self {
            Self::Stored(entity) => Some(entity),
            Self::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// One page of rows plus the number of records matching its filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R: Resource> {
    pub rows: Vec<Row<R>>,
    pub count: u64,
}

/// Proof that a fetch started at a particular cache generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

/// What a page and the total looked like before an optimistic write.
#[derive(Debug, Clone)]
pub struct Snapshot<R: Resource> {
    key: QueryKey,
    page: Option<Page<R>>,
    total: Option<u64>,
}

struct CacheInner<R: Resource> {
    pages: HashMap<QueryKey, Page<R>>,
    stale: HashSet<QueryKey>,
    total: Option<u64>,
    details: HashMap<String, R::Entity>,
    generation: u64,
}

impl<R: Resource> Default for CacheInner<R> {
    fn default() -> Self {
        Self {
            pages: HashMap::new(),
            stale: HashSet::new(),
            total: None,
            details: HashMap::new(),
            generation: 0,
        }
    }
}

pub struct QueryCache<R: Resource> {
    inner: Arc<Mutex<CacheInner<R>>>,
}

impl<R: Resource> Clone for QueryCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> Default for QueryCache<R> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
        }
    }
}

impl<R: Resource> std::fmt::Debug for QueryCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("QueryCache")
            .field("resource", &R::ENDPOINT)
            .field("pages", &inner.pages.len())
            .field("total", &inner.total)
            .field("generation", &inner.generation)
            .finish()
    }
}

impl<R: Resource> QueryCache<R> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<R>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn page(&self, key: &QueryKey) -> Option<Page<R>> {
        self.lock().pages.get(key).cloned()
    }

    /// True when the page was never loaded or has been invalidated since.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let inner = self.lock();
        !inner.pages.contains_key(key) || inner.stale.contains(key) || inner.total.is_none()
    }

    pub fn total(&self) -> Option<u64> {
        self.lock().total
    }

    pub fn set_page(&self, key: QueryKey, page: Page<R>) {
        let mut inner = self.lock();
        inner.stale.remove(&key);
        inner.pages.insert(key, page);
    }

    pub fn set_total(&self, total: u64) {
        self.lock().total = Some(total);
    }

    /// Edit a cached page in place. Returns false when nothing is cached.
    pub fn update_page(&self, key: &QueryKey, f: impl FnOnce(&mut Page<R>)) -> bool {
        match self.lock().pages.get_mut(key) {
            Some(page) => {
                f(page);
                true
            }
            None => false,
        }
    }

    pub fn update_total(&self, f: impl FnOnce(u64) -> u64) {
        let mut inner = self.lock();
        if let Some(total) = inner.total {
            inner.total = Some(f(total));
        }
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket {
            generation: self.lock().generation,
        }
    }

    /// Store the results of a fetch, unless the cache was cancelled or
    /// written optimistically after the fetch began.
    pub fn complete(
        &self,
        ticket: &FetchTicket,
        key: QueryKey,
        page: Page<R>,
        total: u64,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            return false;
        }
        inner.stale.remove(&key);
        inner.pages.insert(key, page);
        inner.total = Some(total);
        true
    }

    /// Make in-flight fetches land nowhere. The network calls themselves run
    /// to completion.
    pub fn cancel(&self) {
        self.lock().generation += 1;
    }

    pub fn snapshot(&self, key: &QueryKey) -> Snapshot<R> {
        let inner = self.lock();
        Snapshot {
            key: key.clone(),
            page: inner.pages.get(key).cloned(),
            total: inner.total,
        }
    }

    pub fn restore(&self, snapshot: Snapshot<R>) {
        let mut inner = self.lock();
        match snapshot.page {
            Some(page) => {
                inner.pages.insert(snapshot.key, page);
            }
            None => {
                inner.pages.remove(&snapshot.key);
            }
        }
        inner.total = snapshot.total;
    }

    pub fn mark_stale(&self, key: &QueryKey) {
        self.lock().stale.insert(key.clone());
    }

    /// Mark every cached page as needing a refetch.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        let keys: Vec<QueryKey> = inner.pages.keys().cloned().collect();
        inner.stale.extend(keys);
    }

    /// Mark every cached page except `key` as needing a refetch.
    pub fn invalidate_others(&self, key: &QueryKey) {
        let mut inner = self.lock();
        let keys: Vec<QueryKey> = inner.pages.keys().filter(|k| *k != key).cloned().collect();
        inner.stale.extend(keys);
    }

    pub fn detail(&self, id: &str) -> Option<R::Entity> {
        self.lock().details.get(id).cloned()
    }

    pub fn set_detail(&self, id: impl Into<String>, entity: R::Entity) {
        self.lock().details.insert(id.into(), entity);
    }

    pub fn remove_detail(&self, id: &str) {
        self.lock().details.remove(id);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        let generation = inner.generation + 1;
        *inner = CacheInner::default();
        inner.generation = generation;
    }
}
