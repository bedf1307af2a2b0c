//! Query-string encoding for list requests.
//!
//! The backend parses nested query parameters in bracket notation
//! (`filters[start][lower]=...`), so filters are flattened the same way.

use serde_json::{Map, Value};

/// Filters, pagination and sort sent with a list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Option<Value>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub sort: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// The filters that will actually be sent, see [`clean_filters`].
    pub fn cleaned_filters(&self) -> Option<Map<String, Value>> {
        match &self.filters {
            Some(Value::Object(filters)) => Some(clean_filters(filters)),
            _ => None,
        }
    }

    /// Flatten into `(key, value)` pairs ready for `RequestBuilder::query`.
    ///
    /// `limit` and `skip` are left out when zero or unset, `sort` when empty.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit.filter(|limit| *limit > 0) {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(skip) = self.skip.filter(|skip| *skip > 0) {
            pairs.push(("skip".to_string(), skip.to_string()));
        }
        if let Some(filters) = self.cleaned_filters() {
            for (key, value) in &filters {
                encode(&format!("filters[{key}]"), value, &mut pairs);
            }
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("sort".to_string(), sort.to_string()));
        }
        pairs
    }
}

/// Drop filters that mean "no constraint".
///
/// Falsy values (`""`, `false`, `0`, `null`) and the `"all"` option are
/// removed, nested objects are cleaned recursively, and arrays, numbers and
/// booleans are kept verbatim.
pub fn clean_filters(filters: &Map<String, Value>) -> Map<String, Value> {
    let mut result = Map::new();
    for (key, value) in filters {
        if !is_truthy(value) {
            continue;
        }
        match value {
            Value::String(s) if s == "all" => {}
            Value::Object(nested) => {
                result.insert(key.clone(), Value::Object(clean_filters(nested)));
            }
            other => {
                result.insert(key.clone(), other.clone());
            }
        }
    }
    result
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn encode(prefix: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                encode(&format!("{prefix}[{key}]"), value, pairs);
            }
        }
        Value::Array(items) => {
            for (i, value) in items.iter().enumerate() {
                encode(&format!("{prefix}[{i}]"), value, pairs);
            }
        }
        Value::String(s) => pairs.push((prefix.to_string(), s.clone())),
        Value::Null => pairs.push((prefix.to_string(), String::new())),
        other => pairs.push((prefix.to_string(), other.to_string())),
    }
}
