use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::{KeyValueStore, Result, StoreError};

/// PostgreSQL-backed key-value store.
///
/// Each domain owns one table with a `key TEXT PRIMARY KEY` and a
/// `value BYTEA` column (see `migrations/`).
#[derive(Clone)]
pub struct PostgresKeyValueStore {
    pool: PgPool,
    table: String,
}

impl PostgresKeyValueStore {
    /// Creates a store over `table`.
    ///
    /// The table name is interpolated into SQL, so only lowercase ASCII
    /// letters and underscores are accepted.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let valid = !table.is_empty() && table.chars().all(|c| c.is_ascii_lowercase() || c == '_');
        if !valid {
            return Err(StoreError::InvalidTable(table));
        }
        Ok(Self { pool, table })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the table this store reads and writes.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Runs the database migrations.
    pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(pool).await
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            self.table
        )
    }
}

#[async_trait]
impl KeyValueStore for PostgresKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> =
            sqlx::query_scalar(&format!("SELECT value FROM {} WHERE key = $1", self.table))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT key, value FROM {} WHERE key = ANY($1)",
            self.table
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        let mut found: HashMap<String, Vec<u8>> = HashMap::with_capacity(rows.len());
        for row in rows {
            found.insert(row.try_get("key")?, row.try_get("value")?);
        }

        Ok(keys.iter().map(|k| found.get(k).cloned()).collect())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(&self.upsert_sql())
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let sql = self.upsert_sql();
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(&sql)
                .bind(key.as_str())
                .bind(value.as_slice())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        // The pool reconnects lazily; a round trip proves a connection is usable again.
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
