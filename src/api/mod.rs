//! REST API module using Axum
//!
//! - `POST /api/cpe?owner=<owner>`: submit a CDM, returns the job id
//! - `GET  /api/cpe?owner=<owner>&cpe_id=<id>`: stream the job output
//! - `GET  /health`: liveness probe

pub mod error;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use crate::queue::JobQueue;

/// Build the application router over any queue backend.
pub fn create_app<Q: JobQueue>(gateway: Gateway<Q>, max_body_bytes: usize) -> Router {
    let cpe_routes = Router::new()
        .route(
            "/cpe",
            get(handlers::get_cpe_status::<Q>).post(handlers::submit_cpe_job::<Q>),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(gateway);

    Router::new()
        .nest("/api", cpe_routes)
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let queue = MemoryQueue::new();
        queue.provision("alice");
        create_app(Gateway::new(queue), 64)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/cpe?owner=alice")
                    .body(Body::from(vec![b'X'; 1024]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    async fn post(uri: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_odd_owner_query_stays_in_envelope() {
        for uri in [
            "/api/cpe?owner=alice&owner=",
            "/api/cpe?owner=alice&owner=bob",
            "/api/cpe?owner=%FF",
            "/api/cpe?owner=%ZZ",
            "/api/cpe?owner",
        ] {
            let (status, json) = post(uri, "OBJECT = OBJECT1").await;
            assert_eq!(status, StatusCode::FORBIDDEN, "uri {uri}");
            assert_eq!(json["error"]["code"], "FORBIDDEN", "uri {uri}");
        }
    }

    #[tokio::test]
    async fn test_repeated_owner_uses_last_value() {
        let (status, _) = post("/api/cpe?owner=bob&owner=alice", "OBJECT = OBJECT1").await;
        assert_eq!(status, StatusCode::OK);
    }
}
