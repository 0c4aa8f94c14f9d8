//! Search-analytics recording.
//!
//! The contract only requires that analytics writes never block or fail a
//! search request — delivery durability is an open question. The
//! default sink just logs the event; a production deployment swaps in a
//! sink that forwards to a real analytics pipeline without touching the
//! resolver.

use std::sync::Arc;

use async_trait::async_trait;
use carepoint_core::model::GeoPoint;
use carepoint_core::query::QueryIntent;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SearchAnalyticsEvent {
    pub query: String,
    pub normalized: String,
    pub intent: QueryIntent,
    pub confidence: f64,
    pub result_count: usize,
    pub latency_ms: u64,
    pub location: Option<GeoPoint>,
    pub session_id: Option<String>,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, event: SearchAnalyticsEvent);
}

/// Fire-and-forget: spawns the sink call so a slow or failing sink never
/// adds latency to the search response.
pub fn record_fire_and_forget(sink: Arc<dyn AnalyticsSink>, event: SearchAnalyticsEvent) {
    tokio::spawn(async move {
        sink.record(event).await;
    });
}

/// Logs the event at debug level and nothing else. The resolved default
/// for the durability open question: analytics are best-effort telemetry,
/// not a write the core is responsible for persisting.
pub struct LoggingAnalyticsSink;

#[async_trait]
impl AnalyticsSink for LoggingAnalyticsSink {
    async fn record(&self, event: SearchAnalyticsEvent) {
        tracing::debug!(
            query = event.query,
            normalized = event.normalized,
            intent = ?event.intent,
            confidence = event.confidence,
            result_count = event.result_count,
            latency_ms = event.latency_ms,
            "search analytics event"
        );
    }
}
