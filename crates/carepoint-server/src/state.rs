//! Application state shared across every Axum handler.

use std::sync::Arc;

use carepoint_resolver::QueryResolver;

use crate::config::CoreConfig;

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<QueryResolver>,
    config: Arc<CoreConfig>,
}

impl AppState {
    pub fn new(resolver: Arc<QueryResolver>, config: CoreConfig) -> Self {
        Self { resolver, config: Arc::new(config) }
    }

    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}
