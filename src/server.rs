// ABOUTME: Listener, Services wiring, and startup/shutdown ordering
// ABOUTME: Cache and store failures abort startup; warmup failures do not

use crate::config::Settings;
use crate::hlr::cache::{self, RecordCache, RedisCache};
use crate::hlr::client::HlrClient;
use crate::metrics::{self, Metrics};
use crate::session::Session;
use crate::store::LookupStore;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// How long in-flight sessions get to finish after the listener stops.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

/// Everything a session needs, wired once at startup and injected into
/// the listener. No global singletons: tests assemble their own.
pub struct Services {
    pub settings: Settings,
    pub resolver: HlrClient,
    pub metrics: Arc<Metrics>,
}

/// The SMPP listener.
pub struct GatewayServer {
    services: Arc<Services>,
}

impl GatewayServer {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Accept sessions until shutdown, then drain them for a bounded
    /// window.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) {
        if let Ok(addr) = listener.local_addr() {
            info!(host = %addr.ip(), port = addr.port(), "smpp server started");
        }

        let sessions = TaskTracker::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let services = self.services.clone();
                            let metrics = services.metrics.clone();
                            metrics.active_smpp_connections.inc();

                            let session = Session::new(stream, services, &shutdown);
                            sessions.spawn(async move {
                                session.run().await;
                                metrics.active_smpp_connections.dec();
                            });
                        }
                        Err(err) => {
                            error!(error = %err, "accept failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }

        info!("smpp server stopped");

        sessions.close();
        if timeout(SHUTDOWN_DRAIN, sessions.wait()).await.is_err() {
            warn!("session drain window elapsed with sessions still active");
        }
    }
}

/// Replay recent store rows into the cache so a restart does not hammer
/// the HLR provider. Failure is logged, never fatal, and replaying twice
/// converges to the same cache contents.
pub async fn warmup_cache(store: &LookupStore, cache: &dyn RecordCache, days: u32, limit: i64) {
    info!(days, limit, "cache warmup started");

    let rows = match store.recent_unique(days, limit).await {
        Ok(rows) => rows,
        Err(err) => {
            error!(error = %err, "cache warmup error");
            return;
        }
    };

    let total = rows.len();
    let mut loaded = 0usize;
    for row in rows {
        match row.record {
            Some(record) => {
                cache.set(&row.msisdn, &record).await;
                loaded += 1;
            }
            None => {
                warn!(msisdn = %row.msisdn, "stored hlr_response is not an object, skipping");
            }
        }
    }

    info!(
        records_loaded = loaded,
        total_available = total,
        "cache warmup complete"
    );
}

/// Bring the gateway up, serve until a shutdown signal, tear it down in
/// reverse order.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(
        smpp_port = settings.smpp_port,
        hlr_url = %settings.hlr_base_url,
        redis_url = %settings.redis_url,
        db_enabled = settings.db_enabled,
        "application starting"
    );

    let metrics = Arc::new(Metrics::new().context("metrics registry init failed")?);
    let shutdown = CancellationToken::new();

    if settings.metrics_enabled {
        tokio::spawn(metrics::serve(
            metrics.clone(),
            settings.metrics_bind_addr(),
            settings.metrics_path.clone(),
            shutdown.clone(),
        ));
    }

    let cache: Arc<dyn RecordCache> = Arc::new(
        RedisCache::connect(
            &settings.redis_url,
            settings.hlr_cache_ttl_seconds,
            settings.redis_max_connections,
            metrics.clone(),
        )
        .await
        .context("redis connection failed")?,
    );

    let store = if settings.db_enabled {
        Some(
            LookupStore::connect(
                settings.db_connect_options(),
                settings.db_pool_min,
                settings.db_pool_max,
            )
            .await
            .context("database connection failed")?,
        )
    } else {
        info!("database disabled");
        None
    };

    if let Some(store) = &store {
        if settings.cache_warmup_enabled {
            warmup_cache(
                store,
                cache.as_ref(),
                settings.cache_warmup_days,
                settings.cache_warmup_limit,
            )
            .await;
        }
    }

    let store_writer = store.as_ref().map(|s| s.start_writer(metrics.clone()));
    let resolver = HlrClient::new(&settings, cache.clone(), store_writer, metrics.clone())
        .context("hlr client init failed")?;

    let listener = TcpListener::bind(settings.smpp_bind_addr())
        .await
        .context("smpp listener bind failed")?;

    let services = Arc::new(Services {
        settings,
        resolver,
        metrics,
    });

    info!("application started");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_token.cancel();
    });

    GatewayServer::new(services.clone())
        .serve(listener, shutdown)
        .await;

    // Teardown proceeds inward: sessions are already drained, then the
    // HLR pool, then the store, and the cache last.
    services.resolver.close();
    if let Some(store) = &store {
        store.close().await;
    }
    cache.close().await;

    info!("application shutdown complete");
    Ok(())
}

/// Probe the external collaborators for the container healthcheck.
/// Returns the process exit code.
pub async fn healthcheck(settings: &Settings) -> i32 {
    if let Err(err) = cache::ping(&settings.redis_url).await {
        error!(error = %err, "healthcheck failed: redis unreachable");
        return 1;
    }

    if settings.db_enabled {
        let store = match LookupStore::connect(
            settings.db_connect_options(),
            1,
            settings.db_pool_max.min(2),
        )
        .await
        {
            Ok(store) => store,
            Err(err) => {
                error!(error = %err, "healthcheck failed: database unreachable");
                return 1;
            }
        };

        let healthy = store.healthcheck().await;
        store.close().await;
        if !healthy {
            error!("healthcheck failed: database unhealthy");
            return 1;
        }
    }

    info!("healthcheck passed");
    0
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
