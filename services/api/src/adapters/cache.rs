//! services/api/src/adapters/cache.rs
//!
//! Response cache backends: a bounded in-process map and a Postgres table.

use async_trait::async_trait;
use autodoc_core::ports::{PortError, PortResult, ResponseCache};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

//=========================================================================================
// In-Memory Backend
//=========================================================================================

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Entries expire after their TTL; when full, the entry closest to expiry is evicted.
pub struct InMemoryCache {
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> PortResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone())
            {
                debug!("Response cache full, evicting {}", victim);
                entries.remove(&victim);
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}

//=========================================================================================
// Database Backend
//=========================================================================================

/// Stores responses in `ai_response_cache` so they survive restarts and are
/// shared between processes.
#[derive(Clone)]
pub struct DbCache {
    pool: PgPool,
}

impl DbCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CacheRecord {
    response: Value,
    expires_at: DateTime<Utc>,
}

const PRUNE_EXPIRED_SQL: &str = "DELETE FROM ai_response_cache WHERE expires_at <= NOW()";

const UPSERT_SQL: &str = "INSERT INTO ai_response_cache (cache_key, response, expires_at) \
     VALUES ($1, $2, $3) \
     ON CONFLICT (cache_key) DO UPDATE \
     SET response = EXCLUDED.response, expires_at = EXCLUDED.expires_at";

#[async_trait]
impl ResponseCache for DbCache {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        let record = sqlx::query_as::<_, CacheRecord>(
            "SELECT response, expires_at FROM ai_response_cache WHERE cache_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record
            .filter(|r| r.expires_at > Utc::now())
            .map(|r| r.response))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> PortResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| PortError::Unexpected(format!("Invalid cache TTL: {}", e)))?;

        let pruned = sqlx::query(PRUNE_EXPIRED_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .rows_affected();
        if pruned > 0 {
            debug!("Pruned {} expired AI cache row(s)", pruned);
        }

        sqlx::query(UPSERT_SQL)
            .bind(key)
            .bind(value)
            .bind(Utc::now() + ttl)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
