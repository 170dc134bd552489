//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! backend, and recorded in the `_migrations` table once applied.
//!
//! ```ignore
//! use waldo::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// All migrations, in application order.
///
/// Every resource shares the `entries` table: `resource` is the catalogue
/// path, `data` the JSON attribute object, timestamps are RFC 3339 strings.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_entries",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource VARCHAR(64) NOT NULL,
                data TEXT NOT NULL DEFAULT '{}',
                created_at VARCHAR(32) NOT NULL,
                updated_at VARCHAR(32) NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_entries_resource ON entries(resource);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS entries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                resource VARCHAR(64) NOT NULL,
                data LONGTEXT NOT NULL,
                created_at VARCHAR(32) NOT NULL,
                updated_at VARCHAR(32) NOT NULL
            );
            CREATE INDEX idx_entries_resource ON entries(resource);
        "#,
    },
    // Activity lists (ads, orders, reservations) default to createdAt:desc
    Migration {
        version: 2,
        name: "index_entries_created_at",
        up_sqlite: r#"
            CREATE INDEX IF NOT EXISTS idx_entries_resource_created
                ON entries(resource, created_at);
        "#,
        up_mysql: r#"
            CREATE INDEX idx_entries_resource_created ON entries(resource, created_at);
        "#,
    },
];

/// Apply every migration that has not been recorded yet.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_versions(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    const SQL: &str = "SELECT version FROM _migrations ORDER BY version";

    match (pool.as_sqlite(), pool.as_mysql()) {
        (Some(sqlite), _) => {
            let rows = sqlx::query(SQL).fetch_all(sqlite).await?;
            Ok(rows.iter().map(|row| row.get::<i64, _>("version") as i32).collect())
        }
        (None, Some(mysql)) => {
            let rows = sqlx::query(SQL).fetch_all(mysql).await?;
            Ok(rows.iter().map(|row| row.get::<i32, _>("version")).collect())
        }
        (None, None) => anyhow::bail!("Database pool exposes no connection"),
    }
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match (pool.as_sqlite(), pool.as_mysql()) {
        (Some(sqlite), _) => apply_migration_sqlite(sqlite, migration).await,
        (None, Some(mysql)) => apply_migration_mysql(mysql, migration).await,
        (None, None) => anyhow::bail!("Database pool exposes no connection"),
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// MySQL DDL auto-commits, so no transaction here.
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration body into statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .filter(|stmt| {
            stmt.lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[test]
    fn test_migration_versions_are_sequential() {
        for (idx, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, idx as i32 + 1);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n-- comment only;\nCREATE INDEX i ON a(id);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "CREATE INDEX i ON a(id)"]);
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.unwrap();

        let first = run_migrations(&pool).await.unwrap();
        assert_eq!(first, MIGRATIONS.len());

        let second = run_migrations(&pool).await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entries_table_exists() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let affected = pool
            .execute(
                "INSERT INTO entries (resource, data, created_at, updated_at) \
                 VALUES ('regions', '{\"name\":\"Maule\"}', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')",
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }
}
