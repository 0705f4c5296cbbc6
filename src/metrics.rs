// ABOUTME: Prometheus instruments for the gateway and the HTTP exporter
// ABOUTME: A single Metrics value lives in Services; no global registry

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// All gateway instruments, registered against one private registry.
pub struct Metrics {
    registry: Registry,

    /// submit_sm outcomes, labeled accepted/rejected.
    pub submit_total: IntCounterVec,
    /// HLR API calls, labeled valid/invalid/timeout/error.
    pub hlr_requests_total: IntCounterVec,
    pub hlr_cache_hits_total: IntCounter,
    pub hlr_cache_misses_total: IntCounter,
    /// DELIVRD receipts pushed to ESMEs, labeled by reason.
    pub delivrd_total: IntCounterVec,
    /// Receipts dropped because the session was gone at emission time.
    pub dlr_dropped_total: IntCounter,
    /// Lookup rows dropped because the store queue was full.
    pub store_queue_dropped_total: IntCounter,

    pub hlr_latency_seconds: Histogram,
    pub submit_processing_seconds: Histogram,

    pub active_smpp_connections: IntGauge,
    pub active_tasks: IntGauge,
    pub redis_connection_pool_size: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submit_total = IntCounterVec::new(
            Opts::new("submit_total", "Total number of SubmitSM requests"),
            &["status"],
        )?;
        let hlr_requests_total = IntCounterVec::new(
            Opts::new("hlr_requests_total", "Total number of HLR API requests"),
            &["result"],
        )?;
        let hlr_cache_hits_total = IntCounter::new(
            "hlr_cache_hits_total",
            "Total number of HLR cache hits",
        )?;
        let hlr_cache_misses_total = IntCounter::new(
            "hlr_cache_misses_total",
            "Total number of HLR cache misses",
        )?;
        let delivrd_total = IntCounterVec::new(
            Opts::new("delivrd_total", "Total number of DELIVRD messages sent"),
            &["reason"],
        )?;
        let dlr_dropped_total = IntCounter::new(
            "dlr_dropped_total",
            "Delivery receipts dropped because the session was unbound",
        )?;
        let store_queue_dropped_total = IntCounter::new(
            "store_queue_dropped_total",
            "Lookup rows dropped because the store queue was full",
        )?;

        let hlr_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("hlr_latency_seconds", "HLR API response time in seconds")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )?;
        let submit_processing_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "submit_processing_seconds",
                "SubmitSM processing time in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0]),
        )?;

        let active_smpp_connections = IntGauge::new(
            "active_smpp_connections",
            "Current number of active SMPP connections",
        )?;
        let active_tasks = IntGauge::new(
            "active_tasks",
            "Current number of pending delivery receipt tasks",
        )?;
        let redis_connection_pool_size = IntGauge::new(
            "redis_connection_pool_size",
            "Configured Redis connection pool size",
        )?;

        registry.register(Box::new(submit_total.clone()))?;
        registry.register(Box::new(hlr_requests_total.clone()))?;
        registry.register(Box::new(hlr_cache_hits_total.clone()))?;
        registry.register(Box::new(hlr_cache_misses_total.clone()))?;
        registry.register(Box::new(delivrd_total.clone()))?;
        registry.register(Box::new(dlr_dropped_total.clone()))?;
        registry.register(Box::new(store_queue_dropped_total.clone()))?;
        registry.register(Box::new(hlr_latency_seconds.clone()))?;
        registry.register(Box::new(submit_processing_seconds.clone()))?;
        registry.register(Box::new(active_smpp_connections.clone()))?;
        registry.register(Box::new(active_tasks.clone()))?;
        registry.register(Box::new(redis_connection_pool_size.clone()))?;

        Ok(Metrics {
            registry,
            submit_total,
            hlr_requests_total,
            hlr_cache_hits_total,
            hlr_cache_misses_total,
            delivrd_total,
            dlr_dropped_total,
            store_queue_dropped_total,
            hlr_latency_seconds,
            submit_processing_seconds,
            active_smpp_connections,
            active_tasks,
            redis_connection_pool_size,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> String {
    metrics.render()
}

/// Serve the metrics endpoint until shutdown is requested.
pub async fn serve(
    metrics: Arc<Metrics>,
    bind_addr: String,
    path: String,
    shutdown: CancellationToken,
) {
    let app = Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %bind_addr, "failed to start metrics server");
            return;
        }
    };

    info!(addr = %bind_addr, path = %path, "metrics server started");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    if let Err(err) = result {
        error!(error = %err, "metrics server error");
    }
}
