use super::{CacheBackend, normalize_domain};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, trace};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS A ( URL TEXT PRIMARY KEY NOT NULL, IP TEXT NOT NULL )";

/// Persistent cache backed by the `A` table of a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let cache = Self::from_pool(pool).await?;
        info!("SQLite cache opened at {}", path.display());
        Ok(cache)
    }

    /// Private in-memory database; a single connection keeps the data alive
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the table if it is absent
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn text_column(row: &SqliteRow, column: &str, key: &str) -> Result<String, StoreError> {
        row.try_get::<String, _>(column)
            .map_err(|e| StoreError::MalformedRow {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn get(&self, domain: &str) -> Result<Option<String>, StoreError> {
        let key = normalize_domain(domain);
        let row = sqlx::query("SELECT IP FROM A WHERE URL = ? COLLATE NOCASE")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;

        let found = row
            .map(|row| Self::text_column(&row, "IP", &key))
            .transpose()?;
        trace!("SQLite lookup {} -> {:?}", key, found);
        Ok(found)
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT URL FROM A WHERE IP = ? LIMIT 1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        let found = row
            .map(|row| Self::text_column(&row, "URL", address))
            .transpose()?;
        trace!("SQLite reverse lookup {} -> {:?}", address, found);
        Ok(found)
    }

    async fn insert(&self, domain: &str, address: &str) -> Result<(), StoreError> {
        let key = normalize_domain(domain);
        sqlx::query(
            "INSERT INTO A (URL, IP) VALUES (?, ?) ON CONFLICT(URL) DO UPDATE SET IP = excluded.IP",
        )
        .bind(&key)
        .bind(address)
        .execute(&self.pool)
        .await?;
        debug!("Stored {} -> {} in SQLite cache", key, address);
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM A")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("SQLite cache pool closed");
    }
}
