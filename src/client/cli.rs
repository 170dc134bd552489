//! `waldo-admin` command line
//!
//! Drives the admin lists from a terminal: every `list` invocation goes
//! through the same [`PaginatedList`] and preferences store a list screen
//! uses, so page sizes and sorts chosen here are remembered.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::http::{ApiClient, ResourceFetcher};
use crate::client::paginated::{ListBinding, ListChanges, LoadStatus, PaginatedList};
use crate::client::preferences::{ListKind, PreferencesStore};
use crate::config::Config;
use crate::models::Resource;

#[derive(Debug, Parser)]
#[command(
    name = "waldo-admin",
    version,
    about = "Browse Waldo listings with remembered list preferences"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one page of a list
    List {
        /// List name, e.g. `pendingAds` or `orders`
        kind: ListKind,
        #[arg(long)]
        page: Option<u32>,
        /// Remembered for the next run
        #[arg(long)]
        page_size: Option<u32>,
        /// `field:asc|desc`, remembered for the next run
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Fetch one record by id or slug
    Get { resource: Resource, id: String },
    /// Show the remembered preferences of a list
    Prefs { kind: ListKind },
    /// Forget all remembered preferences
    PrefsClear,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load_with_env(&self.config)?;
        config.validate()?;

        match self.command {
            Command::List {
                kind,
                page,
                page_size,
                sort,
                search,
            } => {
                let client = Arc::new(ApiClient::from_config(&config)?);
                let preferences = Arc::new(PreferencesStore::from_config(&config.client));
                let fetcher = Arc::new(ResourceFetcher::new(client, kind.resource()));
                let list = PaginatedList::new(ListBinding::for_kind(kind, fetcher, preferences));

                let snapshot = list
                    .apply(ListChanges {
                        page,
                        page_size,
                        sort_by: sort,
                        search_term: search,
                    })
                    .await;

                print_json(&snapshot)?;
                if snapshot.status == LoadStatus::Error {
                    anyhow::bail!(
                        "failed to load {}: {}",
                        kind,
                        snapshot.error.unwrap_or_default()
                    );
                }
            }
            Command::Get { resource, id } => {
                let client = ApiClient::from_config(&config)?;
                let record = client
                    .get(resource, &id)
                    .await
                    .with_context(|| format!("failed to fetch {} {}", resource, id))?;
                print_json(&record)?;
            }
            Command::Prefs { kind } => {
                let preferences = PreferencesStore::from_config(&config.client);
                print_json(&preferences.get(kind))?;
            }
            Command::PrefsClear => {
                PreferencesStore::from_config(&config.client).clear()?;
                println!("Cleared list preferences");
            }
        }

        Ok(())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_command() {
        let cli = Cli::try_parse_from([
            "waldo-admin",
            "list",
            "orders",
            "--page",
            "2",
            "--page-size",
            "50",
            "--sort",
            "amount:asc",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("config.yml"));
        match cli.command {
            Command::List { kind, page, page_size, sort, search } => {
                assert_eq!(kind, ListKind::Orders);
                assert_eq!(page, Some(2));
                assert_eq!(page_size, Some(50));
                assert_eq!(sort.as_deref(), Some("amount:asc"));
                assert!(search.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_get_and_prefs() {
        let cli = Cli::try_parse_from(["waldo-admin", "-c", "other.yml", "get", "regions", "region-nuble"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yml"));
        assert!(matches!(
            cli.command,
            Command::Get { resource: Resource::Regions, ref id } if id == "region-nuble"
        ));

        let cli = Cli::try_parse_from(["waldo-admin", "prefs", "pendingAds"]).unwrap();
        assert!(matches!(cli.command, Command::Prefs { kind: ListKind::PendingAds }));

        let cli = Cli::try_parse_from(["waldo-admin", "prefs-clear"]).unwrap();
        assert!(matches!(cli.command, Command::PrefsClear));
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert!(Cli::try_parse_from(["waldo-admin", "list", "users"]).is_err());
        assert!(Cli::try_parse_from(["waldo-admin", "get", "users", "1"]).is_err());
        assert!(Cli::try_parse_from(["waldo-admin"]).is_err());
    }
}
