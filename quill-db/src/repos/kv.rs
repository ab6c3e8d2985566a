//! Repository for TTL key/value records

use std::time::Duration;

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::{Error, Result};

/// Repository over the `kv_records` table
///
/// Expiry is stored as unix milliseconds; expired rows read as absent even
/// before `purge_expired` removes them.
#[derive(Debug, Clone)]
pub struct KvRepository {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> i64 {
    now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

impl KvRepository {
    /// Create a new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read a live value
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_records WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Insert or overwrite a value
    pub async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_records (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Increment a counter, restarting it when the stored window has expired
    pub async fn increment(&self, key: &str, window_ttl: Duration) -> Result<u64> {
        let now = now_millis();
        let row = sqlx::query(
            "INSERT INTO kv_records (key, value, expires_at) VALUES (?, '1', ?)
             ON CONFLICT(key) DO UPDATE SET
                value = CASE WHEN kv_records.expires_at <= ? THEN '1'
                             ELSE CAST(CAST(kv_records.value AS INTEGER) + 1 AS TEXT) END,
                expires_at = CASE WHEN kv_records.expires_at <= ? THEN excluded.expires_at
                                  ELSE kv_records.expires_at END
             RETURNING value",
        )
        .bind(key)
        .bind(expiry_millis(window_ttl))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let value: String = row.get("value");
        value
            .parse()
            .map_err(|_| Error::InvalidData(format!("counter '{}' holds '{}'", key, value)))
    }

    /// Delete expired rows, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_records WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
