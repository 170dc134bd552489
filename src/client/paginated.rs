//! Paginated list state
//!
//! [`PaginatedList`] drives one admin list screen: it holds the current page,
//! page size, sort and search term, fetches the matching page through a
//! [`ListFetcher`] and writes preference changes back to the
//! [`PreferencesStore`].
//!
//! Loads are never cancelled. Every load takes a sequence number and only the
//! most recently issued one may update the state, so a slow response to an
//! old request can not overwrite a newer page.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::client::http::ListFetcher;
use crate::client::preferences::{ListKind, PreferencesPatch, PreferencesStore};
use crate::client::query::QueryRequest;
use crate::models::Pagination;

/// Everything a list needs, resolved once from its [`ListKind`]
#[derive(Clone)]
pub struct ListBinding {
    pub fetcher: Arc<dyn ListFetcher>,
    pub preferences: Arc<PreferencesStore>,
    pub kind: ListKind,
    pub default_sort_by: String,
    pub base_filters: Option<Value>,
}

impl ListBinding {
    pub fn for_kind(kind: ListKind, fetcher: Arc<dyn ListFetcher>, preferences: Arc<PreferencesStore>) -> Self {
        Self {
            fetcher,
            preferences,
            kind,
            default_sort_by: kind.default_sort_by().to_string(),
            base_filters: kind.base_filters(),
        }
    }
}

/// Load state of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Point-in-time view of a list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSnapshot {
    pub status: LoadStatus,
    pub data: Vec<Value>,
    pub error: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub sort_by: String,
    pub search_term: String,
    pub pagination: Option<Pagination>,
}

/// Several list changes applied with a single load.
///
/// Page size, sort and search changes send the list back to page 1 unless
/// `page` is also given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChanges {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub search_term: Option<String>,
}

#[derive(Debug)]
struct ListState {
    status: LoadStatus,
    data: Vec<Value>,
    error: Option<String>,
    page: u32,
    page_size: u32,
    sort_by: String,
    search_term: String,
    pagination: Option<Pagination>,
    /// Sequence number of the newest issued load
    latest: u64,
}

impl ListState {
    fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            page: self.page,
            page_size: self.page_size,
            sort_by: self.sort_by.clone(),
            search_term: self.search_term.clone(),
            pagination: self.pagination,
        }
    }
}

/// One paginated, filterable admin list
pub struct PaginatedList {
    binding: ListBinding,
    state: Mutex<ListState>,
}

impl PaginatedList {
    /// Start on page 1 with the stored preferences of the bound kind.
    ///
    /// Nothing is fetched until the first setter or [`refetch`](Self::refetch).
    pub fn new(binding: ListBinding) -> Self {
        let stored = binding.preferences.get(binding.kind);
        let sort_by = if stored.sort_by.trim().is_empty() {
            binding.default_sort_by.clone()
        } else {
            stored.sort_by
        };
        let search_term = if binding.kind.persists_search() {
            stored.search_term
        } else {
            String::new()
        };

        Self {
            state: Mutex::new(ListState {
                status: LoadStatus::Idle,
                data: Vec::new(),
                error: None,
                page: 1,
                page_size: stored.page_size.max(1),
                sort_by,
                search_term,
                pagination: None,
                latest: 0,
            }),
            binding,
        }
    }

    pub fn kind(&self) -> ListKind {
        self.binding.kind
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.lock().snapshot()
    }

    pub fn loading(&self) -> bool {
        self.lock().status == LoadStatus::Loading
    }

    /// Reload the current page
    pub async fn refetch(&self) -> ListSnapshot {
        self.load(|_| {}).await
    }

    pub async fn set_page(&self, page: u32) -> ListSnapshot {
        self.apply(ListChanges { page: Some(page), ..ListChanges::default() }).await
    }

    /// Change the page size, back to page 1
    pub async fn set_page_size(&self, page_size: u32) -> ListSnapshot {
        self.apply(ListChanges { page_size: Some(page_size), ..ListChanges::default() }).await
    }

    /// Change the sort, back to page 1
    pub async fn set_sort_by(&self, sort_by: impl Into<String>) -> ListSnapshot {
        self.apply(ListChanges { sort_by: Some(sort_by.into()), ..ListChanges::default() }).await
    }

    /// Change the search term, back to page 1
    pub async fn set_search_term(&self, search_term: impl Into<String>) -> ListSnapshot {
        self.apply(ListChanges { search_term: Some(search_term.into()), ..ListChanges::default() }).await
    }

    /// Apply every change, save the remembered ones together, then fetch once
    pub async fn apply(&self, changes: ListChanges) -> ListSnapshot {
        let page_size = changes.page_size.map(|size| size.max(1));
        let sort_by = changes.sort_by.map(|sort_by| {
            if sort_by.trim().is_empty() {
                self.binding.default_sort_by.clone()
            } else {
                sort_by
            }
        });
        let search_term = changes.search_term;

        let patch = PreferencesPatch {
            page_size,
            sort_by: sort_by.clone(),
            search_term: search_term.clone().filter(|_| self.binding.kind.persists_search()),
        };
        if patch != PreferencesPatch::default() {
            self.persist(patch);
        }

        let resets = page_size.is_some() || sort_by.is_some() || search_term.is_some();
        self.load(|state| {
            if let Some(page_size) = page_size {
                state.page_size = page_size;
            }
            if let Some(sort_by) = sort_by {
                state.sort_by = sort_by;
            }
            if let Some(search_term) = search_term {
                state.search_term = search_term;
            }
            match changes.page {
                Some(page) => state.page = page.max(1),
                None if resets => state.page = 1,
                None => {}
            }
        })
        .await
    }

    /// A failed save only costs the preference, never the list
    fn persist(&self, patch: PreferencesPatch) {
        if let Err(err) = self.binding.preferences.set(self.binding.kind, patch) {
            warn!("Failed to save {} preferences: {}", self.binding.kind, err);
        }
    }

    fn request(&self, state: &ListState) -> QueryRequest {
        let mut request = QueryRequest::new(state.page, state.page_size)
            .with_sort(state.sort_by.clone())
            .with_search(state.search_term.clone());
        if let Some(filters) = &self.binding.base_filters {
            request = request.with_filters(filters.clone());
        }
        request
    }

    async fn load(&self, update: impl FnOnce(&mut ListState)) -> ListSnapshot {
        let (seq, request) = {
            let mut state = self.lock();
            update(&mut *state);
            state.status = LoadStatus::Loading;
            state.latest += 1;
            (state.latest, self.request(&state))
        };

        debug!("Loading {} page {} (request {})", self.binding.kind, request.page, seq);
        let result = self.binding.fetcher.fetch(request).await;

        let mut state = self.lock();
        if state.latest != seq {
            debug!("Discarding stale response for {} (request {})", self.binding.kind, seq);
            return state.snapshot();
        }

        match result {
            Ok(response) => {
                state.pagination = Some(response.meta.pagination);
                state.data = response.data;
                state.error = None;
                state.status = LoadStatus::Success;
            }
            Err(err) => {
                warn!("Failed to load {}: {}", self.binding.kind, err);
                state.error = Some(err.to_string());
                state.status = LoadStatus::Error;
            }
        }
        state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::http::ClientError;
    use crate::client::preferences::MemoryPersistence;
    use crate::models::{ListParams, ListResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    type PageResult = Result<ListResponse<Value>, ClientError>;

    enum Reply {
        Now(PageResult),
        Gated(oneshot::Receiver<PageResult>),
    }

    /// Fetcher answering from a script; unscripted calls get an empty page
    #[derive(Default)]
    struct ScriptedFetcher {
        requests: Mutex<Vec<QueryRequest>>,
        replies: Mutex<VecDeque<Reply>>,
    }

    impl ScriptedFetcher {
        fn reply(&self, reply: Reply) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn requests(&self) -> Vec<QueryRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListFetcher for ScriptedFetcher {
        async fn fetch(&self, request: QueryRequest) -> PageResult {
            let params = ListParams::new(request.page, request.page_size);
            self.requests.lock().unwrap().push(request);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Now(result)) => result,
                Some(Reply::Gated(rx)) => rx.await.expect("gate dropped"),
                None => Ok(ListResponse::new(Vec::new(), Pagination::new(&params, 0))),
            }
        }
    }

    fn page(names: &[&str], page: u32, page_size: u32, total: u64) -> PageResult {
        let data = names.iter().map(|name| json!({ "name": name })).collect();
        Ok(ListResponse::new(data, Pagination::new(&ListParams::new(page, page_size), total)))
    }

    fn failure() -> PageResult {
        Err(ClientError::Api {
            status: 500,
            code: "INTERNAL_ERROR".to_string(),
            message: "Internal server error".to_string(),
        })
    }

    fn setup() -> (Arc<ScriptedFetcher>, Arc<PreferencesStore>, MemoryPersistence) {
        let port = MemoryPersistence::new();
        let preferences = Arc::new(PreferencesStore::load(Box::new(port.clone())));
        (Arc::new(ScriptedFetcher::default()), preferences, port)
    }

    fn list(kind: ListKind, fetcher: &Arc<ScriptedFetcher>, preferences: &Arc<PreferencesStore>) -> PaginatedList {
        PaginatedList::new(ListBinding::for_kind(kind, fetcher.clone(), preferences.clone()))
    }

    #[tokio::test]
    async fn test_initial_state_and_first_load() {
        let (fetcher, preferences, _) = setup();
        let regions = list(ListKind::Regions, &fetcher, &preferences);

        let idle = regions.snapshot();
        assert_eq!(idle.status, LoadStatus::Idle);
        assert_eq!(idle.page, 1);
        assert_eq!(idle.page_size, 25);
        assert_eq!(idle.sort_by, "name:asc");
        assert!(!regions.loading());

        fetcher.reply(Reply::Now(page(&["Arica", "Biobío"], 1, 25, 2)));
        let loaded = regions.refetch().await;
        assert_eq!(loaded.status, LoadStatus::Success);
        assert_eq!(loaded.data.len(), 2);
        assert_eq!(loaded.pagination.unwrap().total, 2);

        let requests = fetcher.requests();
        assert_eq!(requests[0].sort, vec!["name:asc"]);
        assert!(requests[0].filters.is_none());
    }

    #[tokio::test]
    async fn test_base_filters_and_search_are_sent() {
        let (fetcher, preferences, _) = setup();
        let ads = list(ListKind::ActiveAds, &fetcher, &preferences);

        ads.set_search_term("bici").await;

        let request = &fetcher.requests()[0];
        assert_eq!(request.filters, ListKind::ActiveAds.base_filters());
        assert_eq!(request.search.as_deref(), Some("bici"));
        assert_eq!(preferences.get(ListKind::ActiveAds).search_term, "bici");
    }

    #[tokio::test]
    async fn test_page_size_change_resets_page() {
        let (fetcher, preferences, _) = setup();
        let conditions = list(ListKind::Conditions, &fetcher, &preferences);

        conditions.set_page(3).await;
        assert_eq!(conditions.snapshot().page, 3);

        let snapshot = conditions.set_page_size(50).await;
        assert_eq!(snapshot.page, 1);
        assert_eq!(snapshot.page_size, 50);

        let requests = fetcher.requests();
        assert_eq!((requests[0].page, requests[0].page_size), (3, 25));
        assert_eq!((requests[1].page, requests[1].page_size), (1, 50));
        assert_eq!(preferences.get(ListKind::Conditions).page_size, 50);
    }

    #[tokio::test]
    async fn test_sort_and_search_reset_page() {
        let (fetcher, preferences, _) = setup();
        let faqs = list(ListKind::Faqs, &fetcher, &preferences);

        faqs.set_page(4).await;
        assert_eq!(faqs.set_sort_by("title:desc").await.page, 1);
        faqs.set_page(2).await;
        assert_eq!(faqs.set_search_term("envío").await.page, 1);

        // Search is not remembered for reference lists
        assert_eq!(preferences.get(ListKind::Faqs).search_term, "");
        assert_eq!(preferences.get(ListKind::Faqs).sort_by, "title:desc");
        assert_eq!(fetcher.requests().last().unwrap().sort, vec!["title:desc"]);
    }

    #[tokio::test]
    async fn test_apply_fetches_once_with_every_change() {
        let (fetcher, preferences, _) = setup();
        let orders = list(ListKind::Orders, &fetcher, &preferences);

        let snapshot = orders
            .apply(ListChanges {
                page: Some(3),
                page_size: Some(50),
                sort_by: Some("total:desc".to_string()),
                search_term: Some("juan".to_string()),
            })
            .await;

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!((requests[0].page, requests[0].page_size), (3, 50));
        assert_eq!(requests[0].sort, vec!["total:desc"]);
        assert_eq!(requests[0].search.as_deref(), Some("juan"));
        assert_eq!(snapshot.page, 3);

        let stored = preferences.get(ListKind::Orders);
        assert_eq!(stored.page_size, 50);
        assert_eq!(stored.sort_by, "total:desc");
    }

    #[tokio::test]
    async fn test_apply_without_page_resets_to_first() {
        let (fetcher, preferences, _) = setup();
        let regions = list(ListKind::Regions, &fetcher, &preferences);
        regions.set_page(4).await;

        let snapshot = regions
            .apply(ListChanges { page_size: Some(10), sort_by: Some("name:desc".to_string()), ..ListChanges::default() })
            .await;
        assert_eq!(snapshot.page, 1);
        assert_eq!(fetcher.requests().len(), 2);

        let unchanged = regions.apply(ListChanges::default()).await;
        assert_eq!(unchanged.page, 1);
        assert_eq!(unchanged.sort_by, "name:desc");
    }

    #[tokio::test]
    async fn test_blank_sort_falls_back_to_default() {
        let (fetcher, preferences, _) = setup();
        let orders = list(ListKind::Orders, &fetcher, &preferences);
        assert_eq!(orders.set_sort_by("  ").await.sort_by, "createdAt:desc");
    }

    #[tokio::test]
    async fn test_error_keeps_previous_data() {
        let (fetcher, preferences, _) = setup();
        let communes = list(ListKind::Communes, &fetcher, &preferences);

        fetcher.reply(Reply::Now(page(&["Chillán"], 1, 25, 1)));
        communes.refetch().await;

        fetcher.reply(Reply::Now(failure()));
        let failed = communes.set_page(2).await;
        assert_eq!(failed.status, LoadStatus::Error);
        assert_eq!(failed.data, vec![json!({ "name": "Chillán" })]);
        assert!(failed.error.unwrap().contains("Internal server error"));

        fetcher.reply(Reply::Now(page(&["Ñiquén"], 2, 25, 26)));
        let recovered = communes.refetch().await;
        assert_eq!(recovered.status, LoadStatus::Success);
        assert!(recovered.error.is_none());
        assert_eq!(recovered.data, vec![json!({ "name": "Ñiquén" })]);
    }

    #[tokio::test]
    async fn test_last_request_wins() {
        let (fetcher, preferences, _) = setup();
        let categories = Arc::new(list(ListKind::Categories, &fetcher, &preferences));

        let (release_first, gate) = oneshot::channel();
        fetcher.reply(Reply::Gated(gate));
        fetcher.reply(Reply::Now(page(&["second"], 2, 25, 30)));

        let first = {
            let categories = categories.clone();
            tokio::spawn(async move { categories.refetch().await })
        };
        while fetcher.requests().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(categories.loading());

        let second = categories.set_page(2).await;
        assert_eq!(second.data, vec![json!({ "name": "second" })]);

        release_first.send(page(&["first"], 1, 25, 30)).unwrap();
        first.await.unwrap();

        let settled = categories.snapshot();
        assert_eq!(settled.status, LoadStatus::Success);
        assert_eq!(settled.page, 2);
        assert_eq!(settled.data, vec![json!({ "name": "second" })]);
    }

    #[tokio::test]
    async fn test_orders_preferences_survive_reload() {
        let (fetcher, preferences, port) = setup();
        let orders = list(ListKind::Orders, &fetcher, &preferences);
        orders.set_page_size(50).await;
        orders.set_sort_by("amount:asc").await;

        let reloaded = Arc::new(PreferencesStore::load(Box::new(port)));
        let fresh_fetcher = Arc::new(ScriptedFetcher::default());
        let orders = list(ListKind::Orders, &fresh_fetcher, &reloaded);
        let snapshot = orders.snapshot();
        assert_eq!(snapshot.page_size, 50);
        assert_eq!(snapshot.sort_by, "amount:asc");

        let ads = list(ListKind::PendingAds, &fresh_fetcher, &reloaded).snapshot();
        assert_eq!(ads.page_size, 25);
        assert_eq!(ads.sort_by, "createdAt:desc");

        orders.refetch().await;
        let request = &fresh_fetcher.requests()[0];
        assert_eq!(request.page_size, 50);
        assert_eq!(request.sort, vec!["amount:asc"]);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let (fetcher, preferences, _) = setup();
        let packs = list(ListKind::Packs, &fetcher, &preferences);
        let json = serde_json::to_value(packs.snapshot()).unwrap();
        assert_eq!(json["status"], json!("idle"));
        assert_eq!(json["pageSize"], json!(25));
        assert_eq!(json["sortBy"], json!("name:asc"));
    }
}
