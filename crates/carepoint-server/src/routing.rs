//! Route table and middleware stack, factored out of `main` so the app
//! can be built once and exercised directly in tests without binding a
//! socket.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::CoreConfig;
use crate::handlers;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config().request_timeout);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/facilities/search", get(handlers::search_facilities))
        .route("/v1/facilities/suggest", get(handlers::suggest_facilities))
        .route("/v1/facilities/{id}", get(handlers::get_facility))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(build_cors_layer()),
        )
        .with_state(state)
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    use carepoint_core::capability::{FacilityListFilter, FacilityRepository, RankContext, Ranker, SearchAdapter};
    use carepoint_core::error::StoreError;
    use carepoint_core::ids::FacilityId;
    use carepoint_core::model::{Facility, GeoPoint, SearchDocument};
    use carepoint_core::query::SearchParams;
    use carepoint_resolver::{AnalyticsSink, QueryResolver, SearchAnalyticsEvent};

    struct EmptyFacilities;

    #[async_trait::async_trait]
    impl FacilityRepository for EmptyFacilities {
        async fn get_by_id(&self, _id: &FacilityId) -> Result<Option<Facility>, StoreError> {
            Ok(None)
        }
        async fn get_by_ids(&self, _ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError> {
            Ok(vec![])
        }
        async fn list(&self, _filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError> {
            Ok(vec![])
        }
        async fn search_with_count(&self, _params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError> {
            Ok((vec![], 0))
        }
        async fn create(&self, facility: Facility) -> Result<Facility, StoreError> {
            Ok(facility)
        }
        async fn update(&self, facility: Facility) -> Result<Facility, StoreError> {
            Ok(facility)
        }
        async fn delete(&self, _id: &FacilityId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn top_facilities(&self, _n: u32) -> Result<Vec<Facility>, StoreError> {
            Ok(vec![])
        }
    }

    struct EmptySearch;

    #[async_trait::async_trait]
    impl SearchAdapter for EmptySearch {
        async fn ensure_schema(&self) -> Result<(), carepoint_core::error::SearchIndexError> {
            Ok(())
        }
        async fn upsert(&self, _facility: &Facility, _tags: Vec<String>, _insurance: Vec<String>) -> Result<(), carepoint_core::error::SearchIndexError> {
            Ok(())
        }
        async fn delete(&self, _id: &FacilityId) -> Result<(), carepoint_core::error::SearchIndexError> {
            Ok(())
        }
        async fn search(&self, _params: &SearchParams) -> Result<(Vec<SearchDocument>, u64), carepoint_core::error::SearchIndexError> {
            Ok((vec![], 0))
        }
        async fn suggest(&self, _query: &str, _location: Option<GeoPoint>, _limit: u32) -> Result<Vec<SearchDocument>, carepoint_core::error::SearchIndexError> {
            Ok(vec![])
        }
    }

    struct NoopRanker;

    impl Ranker for NoopRanker {
        fn rank(&self, _candidates: Vec<SearchDocument>, _context: &RankContext) -> Vec<carepoint_core::capability::RankedFacility> {
            vec![]
        }
    }

    struct NoopAnalytics;

    #[async_trait::async_trait]
    impl AnalyticsSink for NoopAnalytics {
        async fn record(&self, _event: SearchAnalyticsEvent) {}
    }

    fn test_state() -> AppState {
        let resolver = QueryResolver::new(
            Arc::new(EmptySearch),
            Arc::new(EmptyFacilities),
            None,
            None,
            Arc::new(NoopRanker),
            Arc::new(NoopAnalytics),
        );
        AppState::new(Arc::new(resolver), CoreConfig::for_testing())
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = create_app(test_state());
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn search_with_empty_index_returns_zero_results() {
        let app = create_app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/v1/facilities/search?q=clinic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn negative_offset_is_rejected() {
        let app = create_app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/v1/facilities/search?q=clinic&offset=-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
