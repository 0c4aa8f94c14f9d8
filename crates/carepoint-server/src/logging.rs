//! `tracing`/`tracing-subscriber` initialization for the process.

/// Initializes the global tracing subscriber. Should be called once at
/// process startup, before any other module logs.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("carepoint_server={level},carepoint_ingest={level},carepoint_resolver={level},tower_http=debug")));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
