//! List query model
//!
//! A [`ListQuery`] is the controller-side view of a list request after the
//! query string has been parsed into a nested JSON object. Nothing here is
//! validated: page values are kept raw for coercion and filters are forwarded
//! verbatim to the entity store.

use serde_json::{Map, Value};

use super::pagination::{ListParams, PageLimits};

/// Which relations a list request asked to populate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Populate {
    #[default]
    None,
    All,
    Fields(Vec<String>),
}

impl Populate {
    /// Whether `field` should be populated
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Populate::None => false,
            Populate::All => true,
            Populate::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }

    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s.trim() == "*" => Populate::All,
            Value::String(s) => Populate::Fields(split_list(s)),
            Value::Array(items) => Populate::Fields(
                items
                    .iter()
                    .filter_map(scalar_to_string)
                    .flat_map(|s| split_list(&s))
                    .collect(),
            ),
            Value::Object(map) => Populate::Fields(map.keys().cloned().collect()),
            _ => Populate::None,
        }
    }
}

/// Parsed list request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListQuery {
    /// Raw `pagination[page]`
    pub page: Option<String>,
    /// Raw `pagination[pageSize]`
    pub page_size: Option<String>,
    /// `field:direction` entries, in priority order
    pub sort: Vec<String>,
    /// Filter tree, forwarded unchanged
    pub filters: Option<Value>,
    /// Free-text search term
    pub search: Option<String>,
    /// Relations to populate in list results
    pub populate: Populate,
}

impl ListQuery {
    /// Build a query from the nested parameter object of a request
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let pagination = params.get("pagination").and_then(Value::as_object);
        let raw = |key: &str| {
            pagination
                .and_then(|p| p.get(key))
                .and_then(scalar_to_string)
        };

        let sort = match params.get("sort") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(scalar_to_string)
                .flat_map(|s| split_list(&s))
                .collect(),
            Some(value) => scalar_to_string(value)
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let search = params
            .get("search")
            .or_else(|| params.get("_q"))
            .and_then(scalar_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            page: raw("page"),
            page_size: raw("pageSize"),
            sort,
            filters: params.get("filters").cloned(),
            search,
            populate: params
                .get("populate")
                .map(Populate::from_value)
                .unwrap_or_default(),
        }
    }

    /// Coerce the raw page values
    pub fn list_params(&self, limits: &PageLimits) -> ListParams {
        ListParams::from_raw(self.page.as_deref(), self.page_size.as_deref(), limits)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_reads_pagination_block() {
        let query = ListQuery::from_params(&params(json!({
            "pagination": { "page": "2", "pageSize": "10" }
        })));
        assert_eq!(query.page.as_deref(), Some("2"));
        assert_eq!(query.page_size.as_deref(), Some("10"));
        assert_eq!(query.list_params(&PageLimits::default()), ListParams::new(2, 10));
    }

    #[test]
    fn test_numeric_pagination_values() {
        let query = ListQuery::from_params(&params(json!({
            "pagination": { "page": 3, "pageSize": 5 }
        })));
        assert_eq!(query.list_params(&PageLimits::default()), ListParams::new(3, 5));
    }

    #[test]
    fn test_sort_forms() {
        let single = ListQuery::from_params(&params(json!({ "sort": "name:asc" })));
        assert_eq!(single.sort, vec!["name:asc"]);

        let comma = ListQuery::from_params(&params(json!({ "sort": "name:asc, createdAt:desc" })));
        assert_eq!(comma.sort, vec!["name:asc", "createdAt:desc"]);

        let indexed = ListQuery::from_params(&params(json!({ "sort": ["price:desc", "name"] })));
        assert_eq!(indexed.sort, vec!["price:desc", "name"]);
    }

    #[test]
    fn test_filters_forwarded_verbatim() {
        let filters = json!({ "active": { "$eq": "true" }, "price": { "$bogus": "1" } });
        let query = ListQuery::from_params(&params(json!({ "filters": filters.clone() })));
        assert_eq!(query.filters, Some(filters));
    }

    #[test]
    fn test_search_aliases_and_blank() {
        let q = ListQuery::from_params(&params(json!({ "_q": " talca " })));
        assert_eq!(q.search.as_deref(), Some("talca"));

        let blank = ListQuery::from_params(&params(json!({ "search": "   " })));
        assert!(blank.search.is_none());
    }

    #[test]
    fn test_populate_forms() {
        let all = ListQuery::from_params(&params(json!({ "populate": "*" })));
        assert_eq!(all.populate, Populate::All);
        assert!(all.populate.includes("region"));

        let list = ListQuery::from_params(&params(json!({ "populate": "region,ad" })));
        assert!(list.populate.includes("region"));
        assert!(list.populate.includes("ad"));
        assert!(!list.populate.includes("category"));

        let object = ListQuery::from_params(&params(json!({ "populate": { "region": "true" } })));
        assert_eq!(object.populate, Populate::Fields(vec!["region".to_string()]));

        assert_eq!(ListQuery::default().populate, Populate::None);
    }
}
