//! Database layer
//!
//! The entity store runs on either backend:
//! - SQLite (default, for single-binary deployment and tests)
//! - MySQL (for larger deployments)
//!
//! The driver is selected from configuration. Repositories only see the
//! `DatabasePool` trait object and dispatch on its driver.
//!
//! # Usage
//!
//! ```ignore
//! use waldo::config::DatabaseConfig;
//! use waldo::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod filter;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use filter::{compile_filters, compile_sort, Dialect, FilterError, SqlFragment, SqlValue};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
