//! Composition root: parses configuration, wires every concrete
//! capability implementation behind its trait object, spawns the
//! background tasks, and serves the HTTP surface.

mod config;
mod error;
mod handlers;
mod logging;
mod providers;
mod responses;
mod routing;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use carepoint_cache::{spawn_cache_warmer, spawn_invalidation_listener, CachedFacilityRepository, RedisCacheStore};
use carepoint_core::capability::{CacheStore, EventBus, FacilityRepository, GeoProvider, SearchAdapter};
use carepoint_geo::{CachedGeoProvider, HttpGeoProvider};
use carepoint_ingest::{spawn_enrichment_worker, spawn_ingestion_scheduler, IngestionCoordinator};
use carepoint_normalize::{ConceptQueryUnderstanding, NormalizationTables, QueryTables};
use carepoint_resolver::{DefaultRanker, LoggingAnalyticsSink, QueryResolver};
use carepoint_search::MeiliSearchAdapter;
use carepoint_store::{build_pool, PostgresEnrichmentRepository, PostgresFacilityProcedureRepository, PostgresFacilityRepository, PostgresIdempotencyStore, PostgresProcedureRepository};

use crate::config::CoreConfig;
use crate::providers::{HttpEnrichmentProvider, HttpProviderDataSource};
use crate::state::AppState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CoreConfig::parse();
    logging::init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        std::process::exit(1);
    }

    let pool = build_pool(&config.postgres_config())?;

    let facility_store: Arc<dyn FacilityRepository> = Arc::new(PostgresFacilityRepository::new(pool.clone()));
    let procedures = Arc::new(PostgresProcedureRepository::new(pool.clone()));
    let facility_procedures = Arc::new(PostgresFacilityProcedureRepository::new(pool.clone()));
    let enrichments = Arc::new(PostgresEnrichmentRepository::new(pool.clone()));
    let idempotency = Arc::new(PostgresIdempotencyStore::new(pool.clone()));

    let redis = Arc::new(RedisCacheStore::connect(&config.redis_url).await?);
    let cache: Arc<dyn CacheStore> = redis.clone();
    let events: Arc<dyn EventBus> = redis.clone();

    let facilities: Arc<dyn FacilityRepository> = Arc::new(CachedFacilityRepository::new(facility_store.clone(), cache.clone(), events.clone(), config.node_id.clone()));

    let search_adapter = Arc::new(MeiliSearchAdapter::new(config.meilisearch_url.clone(), config.meilisearch_api_key.clone())?);
    search_adapter.ensure_schema().await?;

    let http_geo: Arc<dyn GeoProvider> = Arc::new(HttpGeoProvider::new(config.geo_provider_url.clone()));
    let geo = Arc::new(CachedGeoProvider::new(http_geo, cache.clone()));

    let query_tables = QueryTables::built_in();
    let understanding = Arc::new(ConceptQueryUnderstanding::new(query_tables));
    let normalization_tables = Arc::new(NormalizationTables::built_in());

    let resolver = Arc::new(QueryResolver::new(
        search_adapter.clone(),
        facilities.clone(),
        Some(facility_store.clone()),
        Some(understanding.clone()),
        Arc::new(DefaultRanker),
        Arc::new(LoggingAnalyticsSink),
    ));

    let state = AppState::new(resolver, config.clone());
    let app = routing::create_app(state);

    let warmer = spawn_cache_warmer(facility_store.clone(), cache.clone(), Duration::from_secs(config.cache_warm_interval_minutes.max(1) as u64 * 60), None);
    let listener = spawn_invalidation_listener(events.clone(), cache.clone(), config.node_id.clone());

    let ingest_config = config.ingest_config();

    let scheduler_handle = match &config.provider_url {
        Some(provider_url) => {
            let provider = Arc::new(HttpProviderDataSource::new(provider_url.clone(), Duration::from_secs(config.provider_ingest_timeout_seconds)));
            let coordinator = Arc::new(IngestionCoordinator::new(
                provider,
                facility_store.clone(),
                procedures.clone(),
                facility_procedures,
                enrichments.clone(),
                idempotency,
                search_adapter.clone(),
                geo as Arc<dyn GeoProvider>,
                normalization_tables,
                ingest_config.clone(),
            ));
            let interval = if config.provider_ingest_interval_minutes > 0 { Some(Duration::from_secs(config.provider_ingest_interval_minutes as u64 * 60)) } else { None };
            Some(spawn_ingestion_scheduler(
                coordinator,
                config.provider_id.clone(),
                config.provider_ingest_on_start,
                ingest_config.startup_retry_cap,
                interval,
                Duration::from_secs(config.provider_ingest_timeout_seconds),
            ))
        }
        None => {
            tracing::info!("no provider_url configured, ingestion scheduler disabled");
            None
        }
    };

    let enrichment_handle = match &config.enrichment_provider_url {
        Some(enrichment_url) => {
            let provider = Arc::new(HttpEnrichmentProvider::new(enrichment_url.clone(), config.enrichment_model_id.clone()));
            Some(spawn_enrichment_worker(procedures, enrichments, provider, config.enrichment_target_version, ingest_config.enrichment_retry_cap, Duration::from_secs(60)))
        }
        None => {
            tracing::info!("no enrichment_provider_url configured, enrichment worker disabled");
            None
        }
    };

    let listener_addr = config.socket_addr();
    tracing::info!(address = %listener_addr, "starting carepoint-server");
    let tcp_listener = tokio::net::TcpListener::bind(&listener_addr).await?;

    axum::serve(tcp_listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shutting down background tasks");
    warmer.shutdown(SHUTDOWN_GRACE).await;
    listener.shutdown(SHUTDOWN_GRACE).await;
    if let Some(handle) = scheduler_handle {
        handle.shutdown(SHUTDOWN_GRACE).await;
    }
    if let Some(handle) = enrichment_handle {
        handle.shutdown(SHUTDOWN_GRACE).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
