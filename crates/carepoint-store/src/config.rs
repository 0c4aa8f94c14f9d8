//! Connection configuration for the transactional store.

use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "carepoint".to_string()
}
fn default_user() -> String {
    "carepoint".to_string()
}
fn default_pool_size() -> usize {
    16
}
fn default_connect_timeout_seconds() -> u64 {
    5
}

/// Postgres connection settings, loaded from environment by
/// `carepoint-server`'s top-level config and handed to [`crate::pool::build_pool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    pub password: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
        }
    }
}

impl PostgresConfig {
    /// A configuration suitable for tests against an ephemeral local
    /// database; callers typically override `database` per test.
    pub fn for_testing() -> Self {
        Self { pool_size: 4, connect_timeout_seconds: 2, ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push("host must not be empty".to_string());
        }
        if self.database.trim().is_empty() {
            errors.push("database must not be empty".to_string());
        }
        if self.pool_size == 0 {
            errors.push("pool_size must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PostgresConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_host_is_rejected() {
        let cfg = PostgresConfig { host: "".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
