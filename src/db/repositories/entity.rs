//! Entity repository
//!
//! Database operations for every catalogue resource.
//!
//! This module provides:
//! - `EntityRepository` trait defining the interface for entry data access
//! - `SqlxEntityRepository` implementing the trait for SQLite and MySQL
//!
//! All resources share the `entries` table. Filter trees and sort expressions are
//! compiled by [`crate::db::filter`]; a [`FilterError`] is returned unwrapped
//! inside the `anyhow::Error` so callers can downcast it.

use crate::config::DatabaseDriver;
use crate::db::filter::{compile_filters, compile_sort, Dialect, FilterError, SqlFragment, SqlValue};
use crate::db::DynDatabasePool;
use crate::models::{format_timestamp, parse_timestamp, Entity, Resource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool};
use std::sync::Arc;

/// Options for a filtered, sorted page of entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Filter tree as received from the client
    pub filters: Option<Value>,
    /// `field:direction` entries
    pub sort: Vec<String>,
    /// Offset of the first row
    pub start: u64,
    /// Maximum number of rows
    pub limit: u64,
}

/// Entity repository trait
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// One page of entries matching `options`
    async fn find_many(&self, resource: Resource, options: &FindOptions) -> Result<Vec<Entity>>;

    /// Number of entries matching `filters`, ignoring paging
    async fn count(&self, resource: Resource, filters: Option<&Value>) -> Result<u64>;

    /// Get entry by ID
    async fn get_by_id(&self, resource: Resource, id: i64) -> Result<Option<Entity>>;

    /// Get several entries by ID; missing ids are skipped
    async fn get_many_by_ids(&self, resource: Resource, ids: &[i64]) -> Result<Vec<Entity>>;

    /// Insert a new entry
    async fn create(&self, resource: Resource, attributes: &Map<String, Value>) -> Result<Entity>;

    /// Replace the attributes of an entry
    async fn update(
        &self,
        resource: Resource,
        id: i64,
        attributes: &Map<String, Value>,
    ) -> Result<Option<Entity>>;

    /// Delete an entry, returning it if it existed
    async fn delete(&self, resource: Resource, id: i64) -> Result<Option<Entity>>;
}

/// SQLx-based entity repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxEntityRepository {
    pool: DynDatabasePool,
}

impl SqlxEntityRepository {
    /// Create a new SQLx entity repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EntityRepository> {
        Arc::new(Self::new(pool))
    }

    fn dialect(&self) -> Dialect {
        self.pool.driver().into()
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool unavailable")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool unavailable")
    }
}

/// Compiled `WHERE` clause for a resource-scoped query
fn where_clause(resource: Resource, filters: Option<&Value>, dialect: Dialect) -> Result<SqlFragment, FilterError> {
    let relation_fields = resource.relation_fields();
    let compiled = compile_filters(filters, dialect, &relation_fields)?;
    let mut binds = vec![SqlValue::Text(resource.as_str().to_string())];
    binds.extend(compiled.binds);
    Ok(SqlFragment {
        sql: format!("WHERE resource = ? AND {}", compiled.sql),
        binds,
    })
}

#[async_trait]
impl EntityRepository for SqlxEntityRepository {
    async fn find_many(&self, resource: Resource, options: &FindOptions) -> Result<Vec<Entity>> {
        let dialect = self.dialect();
        let clause = where_clause(resource, options.filters.as_ref(), dialect)?;
        let order = compile_sort(&options.sort, dialect, &resource.relation_fields())?;
        let sql = format!(
            "SELECT id, data, created_at, updated_at FROM entries {} {} LIMIT ? OFFSET ?",
            clause.sql, order
        );
        let limit = i64::try_from(options.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(options.start).unwrap_or(i64::MAX);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_sqlite(sqlx::query(&sql), &clause.binds)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to list {}", resource))?;
                rows.iter().map(row_to_entity_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = bind_mysql(sqlx::query(&sql), &clause.binds)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.mysql()?)
                    .await
                    .with_context(|| format!("Failed to list {}", resource))?;
                rows.iter().map(row_to_entity_mysql).collect()
            }
        }
    }

    async fn count(&self, resource: Resource, filters: Option<&Value>) -> Result<u64> {
        let clause = where_clause(resource, filters, self.dialect())?;
        let sql = format!("SELECT COUNT(*) FROM entries {}", clause.sql);

        let total: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &clause.binds)
                .fetch_one(self.sqlite()?)
                .await
                .with_context(|| format!("Failed to count {}", resource))?
                .try_get(0)?,
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &clause.binds)
                .fetch_one(self.mysql()?)
                .await
                .with_context(|| format!("Failed to count {}", resource))?
                .try_get(0)?,
        };

        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn get_by_id(&self, resource: Resource, id: i64) -> Result<Option<Entity>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_entry_by_id_sqlite(self.sqlite()?, resource, id).await,
            DatabaseDriver::Mysql => get_entry_by_id_mysql(self.mysql()?, resource, id).await,
        }
    }

    async fn get_many_by_ids(&self, resource: Resource, ids: &[i64]) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, data, created_at, updated_at FROM entries \
             WHERE resource = ? AND id IN ({}) ORDER BY id ASC",
            placeholders
        );
        let mut binds = vec![SqlValue::Text(resource.as_str().to_string())];
        binds.extend(ids.iter().copied().map(SqlValue::Int));

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_sqlite(sqlx::query(&sql), &binds)
                    .fetch_all(self.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to load {} by ids", resource))?;
                rows.iter().map(row_to_entity_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = bind_mysql(sqlx::query(&sql), &binds)
                    .fetch_all(self.mysql()?)
                    .await
                    .with_context(|| format!("Failed to load {} by ids", resource))?;
                rows.iter().map(row_to_entity_mysql).collect()
            }
        }
    }

    async fn create(&self, resource: Resource, attributes: &Map<String, Value>) -> Result<Entity> {
        let now = Utc::now();
        let data = serde_json::to_string(attributes).context("Failed to encode attributes")?;
        let stamp = format_timestamp(&now);
        let sql = "INSERT INTO entries (resource, data, created_at, updated_at) VALUES (?, ?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(resource.as_str())
                .bind(&data)
                .bind(&stamp)
                .bind(&stamp)
                .execute(self.sqlite()?)
                .await
                .with_context(|| format!("Failed to create {} entry", resource))?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => {
                let result = sqlx::query(sql)
                    .bind(resource.as_str())
                    .bind(&data)
                    .bind(&stamp)
                    .bind(&stamp)
                    .execute(self.mysql()?)
                    .await
                    .with_context(|| format!("Failed to create {} entry", resource))?;
                i64::try_from(result.last_insert_id()).context("Inserted id out of range")?
            }
        };

        // Round-trip through the stored format so the result matches later reads
        let stored = parse_timestamp(&stamp)?;
        Ok(Entity {
            id,
            attributes: attributes.clone(),
            created_at: stored,
            updated_at: stored,
        })
    }

    async fn update(
        &self,
        resource: Resource,
        id: i64,
        attributes: &Map<String, Value>,
    ) -> Result<Option<Entity>> {
        let data = serde_json::to_string(attributes).context("Failed to encode attributes")?;
        let stamp = format_timestamp(&Utc::now());
        let sql = "UPDATE entries SET data = ?, updated_at = ? WHERE resource = ? AND id = ?";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&data)
                    .bind(&stamp)
                    .bind(resource.as_str())
                    .bind(id)
                    .execute(self.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to update {} entry {}", resource, id))?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&data)
                    .bind(&stamp)
                    .bind(resource.as_str())
                    .bind(id)
                    .execute(self.mysql()?)
                    .await
                    .with_context(|| format!("Failed to update {} entry {}", resource, id))?;
            }
        }

        // MySQL reports zero affected rows for no-op updates, so re-read
        self.get_by_id(resource, id).await
    }

    async fn delete(&self, resource: Resource, id: i64) -> Result<Option<Entity>> {
        let Some(existing) = self.get_by_id(resource, id).await? else {
            return Ok(None);
        };
        let sql = "DELETE FROM entries WHERE resource = ? AND id = ?";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(resource.as_str())
                    .bind(id)
                    .execute(self.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to delete {} entry {}", resource, id))?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(resource.as_str())
                    .bind(id)
                    .execute(self.mysql()?)
                    .await
                    .with_context(|| format!("Failed to delete {} entry {}", resource, id))?;
            }
        }

        Ok(Some(existing))
    }
}

// ============================================================================
// Bind helpers
// ============================================================================

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

fn decode_attributes(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("Invalid stored attributes")? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_entry_by_id_sqlite(pool: &SqlitePool, resource: Resource, id: i64) -> Result<Option<Entity>> {
    let row = sqlx::query(
        r#"
        SELECT id, data, created_at, updated_at
        FROM entries
        WHERE resource = ? AND id = ?
        "#,
    )
    .bind(resource.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get entry by ID")?;

    row.as_ref().map(row_to_entity_sqlite).transpose()
}

fn row_to_entity_sqlite(row: &SqliteRow) -> Result<Entity> {
    let data: String = row.try_get("data")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Entity {
        id: row.try_get("id")?,
        attributes: decode_attributes(&data)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_entry_by_id_mysql(pool: &MySqlPool, resource: Resource, id: i64) -> Result<Option<Entity>> {
    let row = sqlx::query(
        r#"
        SELECT id, data, created_at, updated_at
        FROM entries
        WHERE resource = ? AND id = ?
        "#,
    )
    .bind(resource.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get entry by ID")?;

    row.as_ref().map(row_to_entity_mysql).transpose()
}

fn row_to_entity_mysql(row: &MySqlRow) -> Result<Entity> {
    let data: String = row.try_get("data")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Entity {
        id: row.try_get("id")?,
        attributes: decode_attributes(&data)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
