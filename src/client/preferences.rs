//! List preferences
//!
//! Every admin list screen remembers its page size and sort order (and, for
//! the ad moderation lists, the last search term) across sessions. The
//! records live in one JSON document per namespace:
//!
//! ```json
//! { "orders": { "pageSize": 50, "sortBy": "amount:asc" },
//!   "activeAds": { "pageSize": 25, "sortBy": "createdAt:desc", "searchTerm": "bici" } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::models::Resource;

/// Page size a list starts with before the user picks one
pub const DEFAULT_PAGE_SIZE: u32 = 25;

// ============================================================================
// List kinds
// ============================================================================

/// Admin list screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListKind {
    PendingAds,
    ActiveAds,
    ArchivedAds,
    BannedAds,
    RejectedAds,
    Categories,
    Communes,
    Conditions,
    Regions,
    Faqs,
    Packs,
    Orders,
    Reservations,
    Featured,
}

impl ListKind {
    pub const ALL: [ListKind; 14] = [
        ListKind::PendingAds,
        ListKind::ActiveAds,
        ListKind::ArchivedAds,
        ListKind::BannedAds,
        ListKind::RejectedAds,
        ListKind::Categories,
        ListKind::Communes,
        ListKind::Conditions,
        ListKind::Regions,
        ListKind::Faqs,
        ListKind::Packs,
        ListKind::Orders,
        ListKind::Reservations,
        ListKind::Featured,
    ];

    /// Key of this kind in the persisted document
    pub fn key(&self) -> &'static str {
        match self {
            ListKind::PendingAds => "pendingAds",
            ListKind::ActiveAds => "activeAds",
            ListKind::ArchivedAds => "archivedAds",
            ListKind::BannedAds => "bannedAds",
            ListKind::RejectedAds => "rejectedAds",
            ListKind::Categories => "categories",
            ListKind::Communes => "communes",
            ListKind::Conditions => "conditions",
            ListKind::Regions => "regions",
            ListKind::Faqs => "faqs",
            ListKind::Packs => "packs",
            ListKind::Orders => "orders",
            ListKind::Reservations => "reservations",
            ListKind::Featured => "featured",
        }
    }

    /// Backend resource the list reads from
    pub fn resource(&self) -> Resource {
        match self {
            ListKind::PendingAds
            | ListKind::ActiveAds
            | ListKind::ArchivedAds
            | ListKind::BannedAds
            | ListKind::RejectedAds => Resource::Ads,
            ListKind::Categories => Resource::Categories,
            ListKind::Communes => Resource::Communes,
            ListKind::Conditions => Resource::Conditions,
            ListKind::Regions => Resource::Regions,
            ListKind::Faqs => Resource::Faqs,
            ListKind::Packs => Resource::AdPacks,
            ListKind::Orders => Resource::Orders,
            ListKind::Reservations => Resource::AdReservations,
            ListKind::Featured => Resource::AdFeaturedReservations,
        }
    }

    fn is_ad_list(&self) -> bool {
        self.resource() == Resource::Ads
    }

    /// Sort a fresh list starts with
    pub fn default_sort_by(&self) -> &'static str {
        match self {
            ListKind::Faqs => "title:asc",
            ListKind::Categories
            | ListKind::Communes
            | ListKind::Conditions
            | ListKind::Regions
            | ListKind::Packs => "name:asc",
            _ => "createdAt:desc",
        }
    }

    /// Filters every request of this list carries
    pub fn base_filters(&self) -> Option<Value> {
        match self {
            ListKind::PendingAds => Some(json!({
                "active": { "$eq": false },
                "rejected": { "$ne": true },
                "banned": { "$ne": true }
            })),
            ListKind::ActiveAds => Some(json!({
                "active": { "$eq": true },
                "banned": { "$ne": true },
                "remainingDays": { "$gt": 0 }
            })),
            ListKind::ArchivedAds => Some(json!({
                "active": { "$eq": true },
                "remainingDays": { "$eq": 0 }
            })),
            ListKind::BannedAds => Some(json!({ "banned": { "$eq": true } })),
            ListKind::RejectedAds => Some(json!({ "rejected": { "$eq": true } })),
            _ => None,
        }
    }

    /// Whether the search term is remembered across sessions
    pub fn persists_search(&self) -> bool {
        self.is_ad_list()
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned for a name that is not a list kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown list: {0}")]
pub struct UnknownListKind(pub String);

impl FromStr for ListKind {
    type Err = UnknownListKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| UnknownListKind(s.to_string()))
    }
}

// ============================================================================
// Records
// ============================================================================

/// Remembered state of one list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRecord {
    pub page_size: u32,
    pub sort_by: String,
    pub search_term: String,
}

impl PreferencesRecord {
    pub fn defaults_for(kind: ListKind) -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: kind.default_sort_by().to_string(),
            search_term: String::new(),
        }
    }

    fn merge(&mut self, patch: &PreferencesPatch) {
        if let Some(page_size) = patch.page_size {
            self.page_size = page_size;
        }
        if let Some(sort_by) = &patch.sort_by {
            self.sort_by = sort_by.clone();
        }
        if let Some(search_term) = &patch.search_term {
            self.search_term = search_term.clone();
        }
    }
}

/// Partial update of a record; also the shape of a persisted entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

impl PreferencesPatch {
    pub fn page_size(page_size: u32) -> Self {
        Self { page_size: Some(page_size), ..Self::default() }
    }

    pub fn sort_by(sort_by: impl Into<String>) -> Self {
        Self { sort_by: Some(sort_by.into()), ..Self::default() }
    }

    pub fn search_term(search_term: impl Into<String>) -> Self {
        Self { search_term: Some(search_term.into()), ..Self::default() }
    }
}

/// Preferences errors
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("Preferences storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preferences could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid preference: {0}")]
    Invalid(String),
}

// ============================================================================
// Persistence
// ============================================================================

/// Where the preferences document is kept
pub trait PersistencePort: Send + Sync {
    /// Stored document, `None` when nothing was saved yet
    fn read(&self) -> Result<Option<String>, PreferencesError>;
    fn write(&self, document: &str) -> Result<(), PreferencesError>;
    fn clear(&self) -> Result<(), PreferencesError>;
}

/// One JSON file per namespace
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", namespace)),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.preferences_dir, &config.namespace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistencePort for FilePersistence {
    fn read(&self) -> Result<Option<String>, PreferencesError> {
        match std::fs::read_to_string(&self.path) {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, document: &str) -> Result<(), PreferencesError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Write next to the target and rename so readers never see half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, document)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PreferencesError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory document; clones share storage
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    document: Arc<Mutex<Option<String>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an existing document
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document.into()))),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PersistencePort for MemoryPersistence {
    fn read(&self) -> Result<Option<String>, PreferencesError> {
        Ok(self.document())
    }

    fn write(&self, document: &str) -> Result<(), PreferencesError> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(document.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PreferencesError> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

/// Per-list preferences, rehydrated from and written through a port
pub struct PreferencesStore {
    records: RwLock<HashMap<ListKind, PreferencesRecord>>,
    port: Box<dyn PersistencePort>,
}

fn defaults() -> HashMap<ListKind, PreferencesRecord> {
    ListKind::ALL
        .into_iter()
        .map(|kind| (kind, PreferencesRecord::defaults_for(kind)))
        .collect()
}

impl PreferencesStore {
    /// Build defaults for every list, then apply what the port holds.
    ///
    /// Unreadable or malformed documents are logged and ignored.
    pub fn load(port: Box<dyn PersistencePort>) -> Self {
        let mut records = defaults();

        match port.read() {
            Ok(Some(document)) => rehydrate(&mut records, &document),
            Ok(None) => debug!("No stored list preferences"),
            Err(err) => warn!("Failed to read list preferences, using defaults: {}", err),
        }

        Self {
            records: RwLock::new(records),
            port,
        }
    }

    /// Store backed by the file named in the client config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::load(Box::new(FilePersistence::from_config(config)))
    }

    pub fn get(&self, kind: ListKind) -> PreferencesRecord {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| PreferencesRecord::defaults_for(kind))
    }

    /// Merge `patch` into the record of `kind` and persist.
    ///
    /// Nothing changes in memory when persisting fails.
    pub fn set(&self, kind: ListKind, patch: PreferencesPatch) -> Result<PreferencesRecord, PreferencesError> {
        if patch.page_size == Some(0) {
            return Err(PreferencesError::Invalid("pageSize must be at least 1".to_string()));
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = records
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| PreferencesRecord::defaults_for(kind));
        updated.merge(&patch);

        let mut next = records.clone();
        next.insert(kind, updated.clone());
        self.port.write(&serialize(&next)?)?;
        *records = next;

        debug!("Saved {} preferences: {:?}", kind, updated);
        Ok(updated)
    }

    /// Forget every stored preference
    pub fn clear(&self) -> Result<(), PreferencesError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        self.port.clear()?;
        *records = defaults();
        Ok(())
    }
}

fn rehydrate(records: &mut HashMap<ListKind, PreferencesRecord>, document: &str) {
    let stored: Map<String, Value> = match serde_json::from_str(document) {
        Ok(stored) => stored,
        Err(err) => {
            warn!("Ignoring malformed list preferences: {}", err);
            return;
        }
    };

    for (key, value) in stored {
        let Ok(kind) = key.parse::<ListKind>() else {
            debug!("Ignoring preferences for unknown list '{}'", key);
            continue;
        };
        let mut patch = match serde_json::from_value::<PreferencesPatch>(value) {
            Ok(patch) => patch,
            Err(err) => {
                warn!("Ignoring malformed preferences for '{}': {}", key, err);
                continue;
            }
        };
        if patch.page_size == Some(0) {
            patch.page_size = None;
        }
        if !kind.persists_search() {
            patch.search_term = None;
        }
        if let Some(record) = records.get_mut(&kind) {
            record.merge(&patch);
        }
    }
}

fn serialize(records: &HashMap<ListKind, PreferencesRecord>) -> Result<String, serde_json::Error> {
    let mut document = Map::new();
    for kind in ListKind::ALL {
        let Some(record) = records.get(&kind) else {
            continue;
        };
        let entry = PreferencesPatch {
            page_size: Some(record.page_size),
            sort_by: Some(record.sort_by.clone()),
            search_term: kind.persists_search().then(|| record.search_term.clone()),
        };
        document.insert(kind.key().to_string(), serde_json::to_value(entry)?);
    }
    serde_json::to_string_pretty(&Value::Object(document))
}
