//! Builds the connection pool shared by every repository in this crate.

use deadpool_postgres::{Config as DeadpoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use carepoint_core::error::StoreError;

use crate::config::PostgresConfig;

pub fn build_pool(config: &PostgresConfig) -> Result<Pool, StoreError> {
    let mut cfg = DeadpoolConfig::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.database.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();
    cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(config.pool_size));

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|err| StoreError::Fatal { message: format!("failed to build postgres pool: {err}") })
}
