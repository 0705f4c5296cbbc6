// ABOUTME: TTL'd MSISDN -> record cache in front of the HLR provider
// ABOUTME: Redis-backed, strictly best-effort; outages degrade to cache misses

use crate::hlr::record::HlrRecord;
use crate::metrics::Metrics;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Cache key prefix; the full key is `hlr:<msisdn>`.
const KEY_PREFIX: &str = "hlr:";

fn cache_key(msisdn: &str) -> String {
    format!("{KEY_PREFIX}{msisdn}")
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// The cache contract consumed by the resolver.
///
/// Every operation is best-effort: a backend failure is logged and
/// surfaced as a miss (get) or a silent no-op (set/delete). A submit_sm
/// must never fail because the cache is down.
#[async_trait]
pub trait RecordCache: Send + Sync {
    async fn get(&self, msisdn: &str) -> Option<HlrRecord>;
    async fn set(&self, msisdn: &str, record: &HlrRecord);
    async fn delete(&self, msisdn: &str);

    /// Release the backend connection. Called once, at the end of
    /// shutdown; operations after close behave like a cache outage
    /// (miss / no-op).
    async fn close(&self);
}

/// Redis-backed record cache.
///
/// A multiplexed connection manager carries all traffic; it reconnects
/// on its own after transient failures, which pairs naturally with the
/// degrade-to-miss contract. `close` takes the manager down, after
/// which every operation degrades.
pub struct RedisCache {
    conn: RwLock<Option<ConnectionManager>>,
    ttl_seconds: u64,
    metrics: Arc<Metrics>,
}

impl RedisCache {
    /// Connect and verify the backend with a PING. Startup fails if the
    /// cache is unreachable; once running, errors only degrade.
    pub async fn connect(
        url: &str,
        ttl_seconds: u64,
        pool_size: u32,
        metrics: Arc<Metrics>,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;

        redis::cmd("PING").query_async::<()>(&mut conn).await?;

        metrics.redis_connection_pool_size.set(pool_size as i64);
        info!(url = %url, "redis connected");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            ttl_seconds,
            metrics,
        })
    }

    fn connection(&self) -> Option<ConnectionManager> {
        self.conn.read().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl RecordCache for RedisCache {
    async fn get(&self, msisdn: &str) -> Option<HlrRecord> {
        if self.ttl_seconds == 0 {
            return None;
        }

        let Some(mut conn) = self.connection() else {
            return None;
        };
        let data: Option<String> = match conn.get(cache_key(msisdn)).await {
            Ok(data) => data,
            Err(err) => {
                warn!(msisdn = %msisdn, error = %err, "cache get error");
                return None;
            }
        };

        match data {
            Some(raw) => match serde_json::from_str::<HlrRecord>(&raw) {
                Ok(record) => {
                    self.metrics.hlr_cache_hits_total.inc();
                    debug!(msisdn = %msisdn, "cache hit");
                    Some(record)
                }
                Err(err) => {
                    warn!(msisdn = %msisdn, error = %err, "cache entry unparseable");
                    None
                }
            },
            None => {
                self.metrics.hlr_cache_misses_total.inc();
                debug!(msisdn = %msisdn, "cache miss");
                None
            }
        }
    }

    async fn set(&self, msisdn: &str, record: &HlrRecord) {
        if self.ttl_seconds == 0 {
            return;
        }

        let data = match serde_json::to_string(record) {
            Ok(data) => data,
            Err(err) => {
                warn!(msisdn = %msisdn, error = %err, "cache serialize error");
                return;
            }
        };

        let Some(mut conn) = self.connection() else {
            return;
        };
        if let Err(err) = conn
            .set_ex::<_, _, ()>(cache_key(msisdn), data, self.ttl_seconds)
            .await
        {
            warn!(msisdn = %msisdn, error = %err, "cache set error");
        } else {
            debug!(msisdn = %msisdn, ttl = self.ttl_seconds, "cache set");
        }
    }

    async fn delete(&self, msisdn: &str) {
        let Some(mut conn) = self.connection() else {
            return;
        };
        if let Err(err) = conn.del::<_, ()>(cache_key(msisdn)).await {
            warn!(msisdn = %msisdn, error = %err, "cache delete error");
        }
    }

    async fn close(&self) {
        let dropped = self
            .conn
            .write()
            .ok()
            .and_then(|mut guard| guard.take())
            .is_some();
        if dropped {
            info!("redis disconnected");
        }
    }
}

/// Probe the cache for the healthcheck entry point.
pub async fn ping(url: &str) -> Result<(), CacheError> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("PING").query_async::<()>(&mut conn).await?;
    Ok(())
}
