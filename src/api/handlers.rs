//! Request handlers for the CPE job endpoints.

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::gateway::{Gateway, GatewayError};
use crate::queue::JobQueue;

/// Query string for `/api/cpe`. Absent parameters read as empty strings so
/// the gateway, not the extractor, decides the error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CpeQuery {
    pub owner: String,
    pub cpe_id: String,
}

impl CpeQuery {
    /// Builds the query from raw decoded pairs. A repeated parameter keeps its
    /// last value; unknown parameters are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "owner" => query.owner = value,
                "cpe_id" => query.cpe_id = value,
                _ => {}
            }
        }
        query
    }
}

/// `POST /api/cpe?owner=...` with a raw CDM body. Responds with the job id.
pub async fn submit_cpe_job<Q: JobQueue>(
    State(gateway): State<Gateway<Q>>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let query = CpeQuery::from_pairs(pairs);
    let id = gateway.submit(&query.owner, &body).await?;
    Ok((StatusCode::OK, id.to_string()).into_response())
}

/// `GET /api/cpe?owner=...&cpe_id=...`. Streams the job output as text.
pub async fn get_cpe_status<Q: JobQueue>(
    State(gateway): State<Gateway<Q>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, GatewayError> {
    let query = CpeQuery::from_pairs(pairs);
    let stream = gateway.fetch(&query.owner, &query.cpe_id).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `GET /health`
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
