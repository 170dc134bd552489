//! Query requests
//!
//! A [`QueryRequest`] is what a list screen asks the API for. It serializes
//! to the bracket-notation query string the list controller parses.

use serde_json::Value;

/// One list request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page
    pub page_size: u32,
    /// `field:direction` entries in priority order
    pub sort: Vec<String>,
    /// Filter tree
    pub filters: Option<Value>,
    /// Free-text search
    pub search: Option<String>,
    /// Relations to populate (`*` or a comma list)
    pub populate: Option<String>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self::new(1, 25)
    }
}

impl QueryRequest {
    /// Request one page; values below 1 are raised to 1
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            sort: Vec::new(),
            filters: None,
            search: None,
            populate: None,
        }
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        let sort = sort.into();
        if !sort.trim().is_empty() {
            self.sort.push(sort);
        }
        self
    }

    pub fn with_filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Set the search term; blank terms are dropped
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() { None } else { Some(search) };
        self
    }

    pub fn with_populate(mut self, populate: impl Into<String>) -> Self {
        self.populate = Some(populate.into());
        self
    }

    /// Ordered key/value pairs, keys in bracket notation, not yet encoded
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("pagination[page]".to_string(), self.page.to_string()),
            ("pagination[pageSize]".to_string(), self.page_size.to_string()),
        ];

        match self.sort.as_slice() {
            [] => {}
            [single] => pairs.push(("sort".to_string(), single.clone())),
            many => pairs.extend(
                many.iter()
                    .enumerate()
                    .map(|(i, s)| (format!("sort[{}]", i), s.clone())),
            ),
        }

        if let Some(filters) = &self.filters {
            flatten("filters", filters, &mut pairs);
        }
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        if let Some(populate) = &self.populate {
            pairs.push(("populate".to_string(), populate.clone()));
        }

        pairs
    }

    /// Percent-encoded query string, without the leading `?`
    pub fn to_query_string(&self) -> String {
        self.to_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn flatten(prefix: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&format!("{}[{}]", prefix, key), child, pairs);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten(&format!("{}[{}]", prefix, i), child, pairs);
            }
        }
        Value::String(s) => pairs.push((prefix.to_string(), s.clone())),
        Value::Null => {}
        other => pairs.push((prefix.to_string(), other.to_string())),
    }
}
