// ABOUTME: Cache-aware resolver for the HLR provider's HTTPS JSON endpoint
// ABOUTME: Single-flight per MSISDN, bounded total concurrency, typed failures

use crate::config::Settings;
use crate::hlr::cache::RecordCache;
use crate::hlr::record::HlrRecord;
use crate::metrics::Metrics;
use crate::store::{LookupRow, StoreWriter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Resolver failures as seen by the submit pipeline.
///
/// Note that error paths never cache a synthetic record, so a retry after
/// a transient provider failure can still succeed.
#[derive(Debug, Error)]
pub enum HlrError {
    #[error("HLR request timed out")]
    Timeout,

    /// Transport failures, non-2xx statuses and malformed payloads. The
    /// pipeline treats them all the same way (ESME_RSYSERR), so they
    /// share a variant.
    #[error("HLR transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for HlrError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HlrError::Timeout
        } else {
            HlrError::Transport(err.to_string())
        }
    }
}

/// Cache-aware client for the HLR provider.
///
/// Lookup order: cache, then (per-MSISDN flight lock + process-wide
/// concurrency gate) a re-check of the cache, then one HTTP GET. The
/// flight lock is what collapses a cold-cache burst for one number into
/// a single provider call; the semaphore bounds total in-flight calls
/// across all numbers.
pub struct HlrClient {
    http: RwLock<Option<reqwest::Client>>,
    cache: Arc<dyn RecordCache>,
    store: Option<StoreWriter>,
    gate: Semaphore,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    metrics: Arc<Metrics>,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl HlrClient {
    pub fn new(
        settings: &Settings,
        cache: Arc<dyn RecordCache>,
        store: Option<StoreWriter>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(settings.hlr_timeout_seconds))
            .build()?;

        Ok(Self {
            http: RwLock::new(Some(http)),
            cache,
            store,
            gate: Semaphore::new(settings.hlr_max_concurrency),
            flights: Mutex::new(HashMap::new()),
            metrics,
            base_url: settings.hlr_base_url.trim_end_matches('/').to_string(),
            api_key: settings.hlr_api_key.clone(),
            api_secret: settings.hlr_api_secret.clone(),
        })
    }

    fn build_url(&self, msisdn: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url, self.api_key, self.api_secret, msisdn
        )
    }

    /// Resolve one MSISDN to its classified HLR record.
    pub async fn lookup(
        &self,
        msisdn: &str,
        source_ip: Option<&str>,
    ) -> Result<HlrRecord, HlrError> {
        if let Some(hit) = self.cache.get(msisdn).await {
            return Ok(hit);
        }

        // One flight per number: concurrent cold-cache callers for the
        // same MSISDN queue here and are served by the re-check below
        // once the first flight lands.
        let flight = {
            let mut flights = self.flights.lock().await;
            flights.entry(msisdn.to_string()).or_default().clone()
        };
        let result = {
            let _in_flight = flight.lock().await;

            match self.cache.get(msisdn).await {
                Some(hit) => {
                    debug!(msisdn = %msisdn, "cache hit after flight wait");
                    Ok(hit)
                }
                None => self.resolve_uncached(msisdn, source_ip).await,
            }
        };

        drop(flight);
        let mut flights = self.flights.lock().await;
        if let Some(entry) = flights.get(msisdn) {
            // Only the map still holds the lock: nobody is waiting.
            if Arc::strong_count(entry) == 1 {
                flights.remove(msisdn);
            }
        }

        result
    }

    async fn resolve_uncached(
        &self,
        msisdn: &str,
        source_ip: Option<&str>,
    ) -> Result<HlrRecord, HlrError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| HlrError::Transport("resolver is shutting down".to_string()))?;

        debug!(msisdn = %msisdn, "hlr request start");
        let started = Instant::now();

        let outcome = self.fetch(msisdn).await;
        let latency = started.elapsed();
        self.metrics.hlr_latency_seconds.observe(latency.as_secs_f64());

        let mut record = match outcome {
            Ok(record) => record,
            Err(err) => {
                let result = match &err {
                    HlrError::Timeout => "timeout",
                    HlrError::Transport(_) => "error",
                };
                self.metrics.hlr_requests_total.with_label_values(&[result]).inc();
                warn!(msisdn = %msisdn, error = %err, "hlr lookup failed");
                return Err(err);
            }
        };

        record.stamp_classification();
        let classification = record.classification();
        self.metrics
            .hlr_requests_total
            .with_label_values(&[classification.as_str()])
            .inc();

        self.cache.set(msisdn, &record).await;
        drop(_permit);

        // Persisting the lookup is fire-and-forget; the row is handed to
        // the bounded store queue after the permit is released.
        if let Some(store) = &self.store {
            store.enqueue(LookupRow {
                msisdn: msisdn.to_string(),
                record: record.clone(),
                latency_ms: latency.as_secs_f64() * 1000.0,
                cached: false,
                source_ip: source_ip.map(str::to_string),
            });
        }

        info!(
            msisdn = %msisdn,
            classification = classification.as_str(),
            error = record.error(),
            status = record.status(),
            present = record.present().unwrap_or("na"),
            "hlr lookup success"
        );

        Ok(record)
    }

    /// Stop admitting lookups and drop the provider connection pool.
    ///
    /// Waiters on the concurrency gate fail out as transport errors;
    /// requests already in flight finish on their own handle to the
    /// pool.
    pub fn close(&self) {
        self.gate.close();
        if let Ok(mut guard) = self.http.write() {
            guard.take();
        }
        info!("hlr client closed");
    }

    async fn fetch(&self, msisdn: &str) -> Result<HlrRecord, HlrError> {
        let Some(http) = self.http.read().ok().and_then(|guard| guard.clone()) else {
            return Err(HlrError::Transport("hlr client is closed".to_string()));
        };

        let response = http
            .get(self.build_url(msisdn))
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;

        // The provider keys the record by the queried number; an absent
        // or empty sub-map still classifies (as invalid).
        let record = match payload.get(msisdn) {
            Some(Value::Object(map)) if !map.is_empty() => HlrRecord::from_map(map.clone()),
            _ => HlrRecord::empty_response(msisdn),
        };

        Ok(record)
    }
}
