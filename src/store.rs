// ABOUTME: Durable log of completed HLR lookups in PostgreSQL
// ABOUTME: Appends ride a bounded queue off the submit path; reads only serve warmup

use crate::hlr::record::HlrRecord;
use crate::metrics::Metrics;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Rows waiting for the writer task beyond this depth are dropped (with a
/// metric) rather than blocking a submit.
const QUEUE_DEPTH: usize = 1024;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hlr_lookups (
    id           BIGSERIAL PRIMARY KEY,
    msisdn       TEXT NOT NULL,
    classification TEXT NOT NULL,
    error_code   BIGINT,
    status_code  BIGINT,
    present      TEXT,
    mcc          TEXT,
    mnc          TEXT,
    operator     TEXT,
    network_type TEXT,
    country      TEXT,
    ported       BOOLEAN,
    hlr_response JSONB NOT NULL,
    latency_ms   DOUBLE PRECISION,
    cached       BOOLEAN NOT NULL DEFAULT FALSE,
    source_ip    TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS hlr_lookups_msisdn_created_at_idx
    ON hlr_lookups (msisdn, created_at DESC)
"#;

/// Map the first three MCC digits to a two-letter country code.
///
/// Deliberately incomplete: it covers the networks this gateway actually
/// sees and is an approximation, not authoritative.
pub fn country_from_mcc(mcc: Option<&str>) -> Option<&'static str> {
    let prefix = mcc?.get(..3)?;
    match prefix {
        "255" => Some("UA"),
        "310" | "311" => Some("US"),
        "250" => Some("RU"),
        "234" => Some("GB"),
        "262" => Some("DE"),
        "208" => Some("FR"),
        _ => None,
    }
}

/// One completed lookup, queued for persistence.
#[derive(Debug, Clone)]
pub struct LookupRow {
    pub msisdn: String,
    pub record: HlrRecord,
    pub latency_ms: f64,
    pub cached: bool,
    pub source_ip: Option<String>,
}

/// A row as read back for warmup.
#[derive(Debug, Clone)]
pub struct WarmupRow {
    pub msisdn: String,
    pub record: Option<HlrRecord>,
}

/// PostgreSQL client for the lookup log.
#[derive(Debug, Clone)]
pub struct LookupStore {
    pool: PgPool,
}

impl LookupStore {
    /// Build the pool, bootstrap the schema, and verify connectivity.
    /// Failure here is fatal at startup.
    pub async fn connect(
        options: sqlx::postgres::PgConnectOptions,
        pool_min: u32,
        pool_max: u32,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(pool_min)
            .max_connections(pool_max)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(&pool).await?;
            }
        }

        let version: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&pool)
            .await?;
        info!(version = %version.chars().take(50).collect::<String>(), "database connected");

        Ok(Self { pool })
    }

    /// Spawn the queue drainer and hand out the write side.
    ///
    /// The worker exits once every `StoreWriter` clone is dropped, which
    /// is how shutdown drains the queue.
    pub fn start_writer(&self, metrics: Arc<Metrics>) -> StoreWriter {
        let (tx, mut rx) = mpsc::channel::<LookupRow>(QUEUE_DEPTH);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            while let Some(row) = rx.recv().await {
                if let Err(err) = insert_lookup(&pool, &row).await {
                    error!(msisdn = %row.msisdn, error = %err, "hlr lookup save error");
                }
            }
            debug!("store writer drained");
        });

        StoreWriter { tx, metrics }
    }

    /// Most recent record per MSISDN inside the window, capped at
    /// `limit`. Only called at startup.
    pub async fn recent_unique(
        &self,
        days: u32,
        limit: i64,
    ) -> Result<Vec<WarmupRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (msisdn) msisdn, hlr_response
            FROM hlr_lookups
            WHERE created_at >= NOW() - ($1 * INTERVAL '1 day')
            ORDER BY msisdn, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(days as i32)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let msisdn: String = row.try_get("msisdn")?;
            let response: Json<serde_json::Value> = row.try_get("hlr_response")?;
            let record = match response.0 {
                serde_json::Value::Object(map) => Some(HlrRecord::from_map(map)),
                _ => None,
            };
            results.push(WarmupRow { msisdn, record });
        }

        info!(count = results.len(), days, "recent lookups loaded");
        Ok(results)
    }

    /// Connection probe for the healthcheck entry point.
    pub async fn healthcheck(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("database disconnected");
    }
}

async fn insert_lookup(pool: &PgPool, row: &LookupRow) -> Result<(), sqlx::Error> {
    let record = &row.record;
    let mcc = record.mcc();

    sqlx::query(
        r#"
        INSERT INTO hlr_lookups (
            msisdn, classification, error_code, status_code, present,
            mcc, mnc, operator, network_type, country, ported,
            hlr_response, latency_ms, cached, source_ip
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(&row.msisdn)
    .bind(record.classification().as_str())
    .bind(record.error())
    .bind(record.status())
    .bind(record.present())
    .bind(&mcc)
    .bind(record.mnc())
    .bind(record.network())
    .bind(record.network_type())
    .bind(country_from_mcc(mcc.as_deref()))
    .bind(record.ported())
    .bind(Json(record))
    .bind(row.latency_ms)
    .bind(row.cached)
    .bind(&row.source_ip)
    .execute(pool)
    .await?;

    debug!(msisdn = %row.msisdn, "hlr lookup saved");
    Ok(())
}

/// Handle for fire-and-forget appends to the lookup log.
#[derive(Clone)]
pub struct StoreWriter {
    tx: mpsc::Sender<LookupRow>,
    metrics: Arc<Metrics>,
}

impl StoreWriter {
    /// Queue one row. Never blocks: when the queue is full the row is
    /// dropped and counted.
    pub fn enqueue(&self, row: LookupRow) {
        if let Err(err) = self.tx.try_send(row) {
            self.metrics.store_queue_dropped_total.inc();
            warn!(error = %err, "store queue full, dropping lookup row");
        }
    }
}
