//! `KvStore` over the SQLite key/value table

use std::time::Duration;

use async_trait::async_trait;
use quill_db::Database;

use super::KvStore;
use crate::{Error, Result};

impl From<quill_db::Error> for Error {
    fn from(err: quill_db::Error) -> Self {
        Error::Store(err.to_string())
    }
}

#[async_trait]
impl KvStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv().get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        Ok(self.kv().put(key, value, ttl).await?)
    }

    async fn increment(&self, key: &str, window_ttl: Duration) -> Result<u64> {
        Ok(self.kv().increment(key, window_ttl).await?)
    }
}
