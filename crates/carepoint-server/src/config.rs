//! Top-level server configuration: a `clap::Parser` struct with
//! `#[arg(long, env = "...")]` fields, a hand-written `Default`, a
//! `validate()`, and a `for_testing()` constructor.

use clap::Parser;

use carepoint_ingest::IngestConfig;
use carepoint_store::PostgresConfig;

/// Configuration for the Carepoint price-discovery server.
///
/// Constructed via [`CoreConfig::parse`] (CLI + environment) or
/// [`CoreConfig::default`] (programmatic). Per-crate sub-configs
/// (`PostgresConfig`, `IngestConfig`) are derived from this struct's fields
/// rather than flattened, so each downstream crate keeps its own
/// independently testable config type.
#[derive(Debug, Clone, Parser)]
#[command(name = "carepoint-server")]
#[command(about = "Procedure price discovery server")]
pub struct CoreConfig {
    /// Port to listen on.
    #[arg(long, env = "CAREPOINT_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "CAREPOINT_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "CAREPOINT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "CAREPOINT_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Identity of this process among its replicas; stamped into
    /// cache-invalidation events so a node can ignore its own publications.
    #[arg(long, env = "CAREPOINT_NODE_ID", default_value = "carepoint-server")]
    pub node_id: String,

    /// Postgres host.
    #[arg(long, env = "CAREPOINT_POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,
    /// Postgres port.
    #[arg(long, env = "CAREPOINT_POSTGRES_PORT", default_value = "5432")]
    pub postgres_port: u16,
    /// Postgres database name.
    #[arg(long, env = "CAREPOINT_POSTGRES_DATABASE", default_value = "carepoint")]
    pub postgres_database: String,
    /// Postgres user.
    #[arg(long, env = "CAREPOINT_POSTGRES_USER", default_value = "carepoint")]
    pub postgres_user: String,
    /// Postgres password.
    #[arg(long, env = "CAREPOINT_POSTGRES_PASSWORD")]
    pub postgres_password: Option<String>,
    /// Postgres pool size.
    #[arg(long, env = "CAREPOINT_POSTGRES_POOL_SIZE", default_value = "16")]
    pub postgres_pool_size: usize,

    /// Redis connection URL.
    #[arg(long, env = "CAREPOINT_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Meilisearch base URL.
    #[arg(long, env = "CAREPOINT_MEILISEARCH_URL", default_value = "http://127.0.0.1:7700")]
    pub meilisearch_url: String,
    /// Meilisearch API key, if the instance requires one.
    #[arg(long, env = "CAREPOINT_MEILISEARCH_API_KEY")]
    pub meilisearch_api_key: Option<String>,

    /// Base URL of the geocoding provider.
    #[arg(long, env = "CAREPOINT_GEO_PROVIDER_URL", default_value = "https://nominatim.openstreetmap.org")]
    pub geo_provider_url: String,

    /// Base URL of the procedure enrichment provider. Absent disables
    /// enrichment entirely — a missing collaborator, not a fatal error.
    #[arg(long, env = "CAREPOINT_ENRICHMENT_PROVIDER_URL")]
    pub enrichment_provider_url: Option<String>,
    /// Nominal model/provider identifier stamped into enrichment rows.
    #[arg(long, env = "CAREPOINT_ENRICHMENT_MODEL_ID", default_value = "carepoint-enrichment-v1")]
    pub enrichment_model_id: String,

    /// Base URL of the facility/procedure provider data feed.
    #[arg(long, env = "CAREPOINT_PROVIDER_URL")]
    pub provider_url: Option<String>,
    /// Identifier of the provider to ingest from.
    #[arg(long, env = "CAREPOINT_PROVIDER_ID", default_value = "default")]
    pub provider_id: String,

    /// Provider page size (0 = provider default).
    #[arg(long, env = "CAREPOINT_PROVIDER_INGEST_PAGE_SIZE", default_value = "0")]
    pub provider_ingest_page_size: u32,
    /// Ingestion idempotency TTL, minutes.
    #[arg(long, env = "CAREPOINT_PROVIDER_INGESTION_IDEMPOTENCY_TTL_MINUTES", default_value = "1440")]
    pub provider_ingestion_idempotency_ttl_minutes: u32,
    /// Whether to run an ingestion sync immediately at startup.
    #[arg(long, env = "CAREPOINT_PROVIDER_INGEST_ON_START", default_value = "false")]
    pub provider_ingest_on_start: bool,
    /// Minutes between periodic ingestion syncs (0 disables the scheduler).
    #[arg(long, env = "CAREPOINT_PROVIDER_INGEST_INTERVAL_MINUTES", default_value = "0")]
    pub provider_ingest_interval_minutes: u32,
    /// Per-page fetch timeout, seconds.
    #[arg(long, env = "CAREPOINT_PROVIDER_INGEST_TIMEOUT_SECONDS", default_value = "120")]
    pub provider_ingest_timeout_seconds: u64,

    /// Cache warm cycle interval, minutes.
    #[arg(long, env = "CAREPOINT_CACHE_WARM_INTERVAL_MINUTES", default_value = "5")]
    pub cache_warm_interval_minutes: u32,

    /// Enrichment rows below this version are re-enriched.
    #[arg(long, env = "CAREPOINT_ENRICHMENT_TARGET_VERSION", default_value = "1")]
    pub enrichment_target_version: i32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: 30,
            node_id: "carepoint-server".to_string(),
            postgres_host: "localhost".to_string(),
            postgres_port: 5432,
            postgres_database: "carepoint".to_string(),
            postgres_user: "carepoint".to_string(),
            postgres_password: None,
            postgres_pool_size: 16,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            meilisearch_url: "http://127.0.0.1:7700".to_string(),
            meilisearch_api_key: None,
            geo_provider_url: "https://nominatim.openstreetmap.org".to_string(),
            enrichment_provider_url: None,
            enrichment_model_id: "carepoint-enrichment-v1".to_string(),
            provider_url: None,
            provider_id: "default".to_string(),
            provider_ingest_page_size: 0,
            provider_ingestion_idempotency_ttl_minutes: 1440,
            provider_ingest_on_start: false,
            provider_ingest_interval_minutes: 0,
            provider_ingest_timeout_seconds: 120,
            cache_warm_interval_minutes: 5,
            enrichment_target_version: 1,
        }
    }
}

impl CoreConfig {
    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the per-crate Postgres connection config.
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            user: self.postgres_user.clone(),
            password: self.postgres_password.clone(),
            pool_size: self.postgres_pool_size,
            connect_timeout_seconds: 5,
        }
    }

    /// Builds the per-crate ingestion tuning config.
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            provider_ingest_page_size: self.provider_ingest_page_size,
            provider_ingestion_idempotency_ttl_minutes: self.provider_ingestion_idempotency_ttl_minutes,
            provider_ingest_on_start: self.provider_ingest_on_start,
            provider_ingest_interval_minutes: self.provider_ingest_interval_minutes,
            provider_ingest_timeout_seconds: self.provider_ingest_timeout_seconds,
            enrichment_target_version: self.enrichment_target_version,
            ..Default::default()
        }
    }

    /// Validates the configuration, aggregating errors from every
    /// sub-config plus the fields this struct owns directly.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("port cannot be 0".to_string());
        }
        if self.request_timeout == 0 {
            errors.push("request_timeout cannot be 0".to_string());
        }
        if self.node_id.trim().is_empty() {
            errors.push("node_id must not be empty".to_string());
        }

        if let Err(postgres_errors) = self.postgres_config().validate() {
            errors.extend(postgres_errors);
        }
        if let Err(ingest_errors) = self.ingest_config().validate() {
            errors.extend(ingest_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// A configuration suitable for tests: ephemeral port, short timeouts,
    /// every external provider unconfigured.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            log_level: "debug".to_string(),
            request_timeout: 5,
            node_id: "carepoint-server-test".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = CoreConfig { port: 0, ..Default::default() };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("port")));
    }

    #[test]
    fn for_testing_uses_ephemeral_port() {
        let config = CoreConfig::for_testing();
        assert_eq!(config.port, 0);
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let config = CoreConfig { host: "0.0.0.0".to_string(), port: 3000, ..Default::default() };
        assert_eq!(config.socket_addr(), "0.0.0.0:3000");
    }
}
