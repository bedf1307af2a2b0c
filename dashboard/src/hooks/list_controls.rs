use super::filters::Filters;
use crate::state::QueryKey;
use payloads::ListQuery;

/// Page sizes offered by the list views.
pub const LIMIT_OPTIONS: [u64; 4] = [20, 50, 100, 200];

/// Filters, pagination and sort of one list view.
#[derive(Debug, Clone, PartialEq)]
pub struct ListControls<F> {
    filters: F,
    limit: u64,
    page: u64,
    sort: String,
}

impl<F: Filters> ListControls<F> {
    pub fn new(default_sort: impl Into<String>, limit: u64) -> Self {
        Self {
            filters: F::default(),
            limit: limit.max(1),
            page: 0,
            sort: default_sort.into(),
        }
    }

    pub fn filters(&self) -> &F {
        &self.filters
    }

    /// Replace the filters. Any filter change goes back to the first page.
    pub fn set_filters(&mut self, filters: F) {
        self.filters = filters;
        self.page = 0;
    }

    pub fn apply(&mut self, change: F::Change) {
        self.filters.apply(change);
        self.page = 0;
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Change the page size. The current page index is kept.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit.max(1);
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn set_page(&mut self, page: u64) {
        self.page = page;
    }

    /// Advance one page unless already on the last one for `count` records.
    pub fn next_page(&mut self, count: u64) {
        if (self.page as i64) < self.max_page(count) {
            self.page += 1;
        }
    }

    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn sort(&self) -> &str {
        &self.sort
    }

    pub fn set_sort(&mut self, sort: impl Into<String>) {
        self.sort = sort.into();
    }

    /// Cycle the sort on a column: ascending, then descending, then back to
    /// ascending. Picking a different column sorts it ascending.
    pub fn toggle_sort(&mut self, field: &str) {
        self.sort = if self.sort == field {
            format!("-{field}")
        } else {
            field.to_string()
        };
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_mul(self.limit)
    }

    /// Index of the last page. `-1` when there is nothing to show.
    pub fn max_page(&self, count: u64) -> i64 {
        count.div_ceil(self.limit) as i64 - 1
    }

    /// 1-based position of the first row on screen.
    pub fn lower_shown(&self) -> u64 {
        self.skip().saturating_add(1)
    }

    /// 1-based position of the last row on screen.
    pub fn upper_shown(&self, rows: usize) -> u64 {
        self.skip().saturating_add(rows as u64)
    }

    pub fn key(&self, resource: &'static str) -> QueryKey {
        QueryKey::new(resource, &self.filters, self.limit, self.skip(), self.sort.as_str())
    }

    pub fn query(&self) -> ListQuery {
        let query = ListQuery::new()
            .limit(self.limit)
            .skip(self.skip())
            .sort(self.sort.as_str());
        match serde_json::to_value(&self.filters) {
            Ok(filters) => query.filters(filters),
            Err(e) => {
                tracing::error!("Failed to serialize filters: {e}");
                query
            }
        }
    }
}
