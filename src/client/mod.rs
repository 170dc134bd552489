//! Admin-side list client
//!
//! - `query`: list requests in bracket notation
//! - `http`: API client and the [`ListFetcher`] seam
//! - `preferences`: per-list page size, sort and search persistence
//! - `paginated`: list state with last-request-wins loading
//! - `cli`: the `waldo-admin` command line

pub mod cli;
pub mod http;
pub mod paginated;
pub mod preferences;
pub mod query;

pub use http::{ApiClient, ClientError, ListFetcher, ResourceFetcher};
pub use paginated::{ListBinding, ListChanges, ListSnapshot, LoadStatus, PaginatedList};
pub use preferences::{
    FilePersistence, ListKind, MemoryPersistence, PersistencePort, PreferencesError,
    PreferencesPatch, PreferencesRecord, PreferencesStore,
};
pub use query::QueryRequest;
