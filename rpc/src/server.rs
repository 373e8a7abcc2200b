//! Axum server exposing the cache read model.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use tally_sync::{Cache, CacheMetrics, ServiceStatus};
use tally_types::{Address, Timestamp};

/// Shared state handed to every handler.
#[derive(Clone)]
struct AppState {
    cache: Arc<Cache>,
    metrics: Arc<CacheMetrics>,
}

/// The query API server, configured with a port and the shared cache.
pub struct RpcServer {
    pub port: u16,
    cache: Arc<Cache>,
    metrics: Arc<CacheMetrics>,
}

impl RpcServer {
    pub fn new(port: u16, cache: Arc<Cache>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            port,
            cache,
            metrics,
        }
    }

    /// Build the router. Separated from [`start`] so tests can drive the
    /// routes without binding a socket.
    ///
    /// [`start`]: RpcServer::start
    pub fn router(&self) -> Router {
        let state = AppState {
            cache: Arc::clone(&self.cache),
            metrics: Arc::clone(&self.metrics),
        };
        Router::new()
            .route("/daos", get(daos))
            .route("/dao/:address", get(dao))
            .route("/numDaos", get(num_daos))
            .route("/proposal/:address", get(proposal))
            .route("/proposal/:address/nftHolders", get(nft_holders))
            .route("/proposalsByState", get(proposals_by_state))
            .route("/registry", get(registry))
            .route("/stateUpdateTime", get(state_update_time))
            .route("/fetchUpdateTime/:address", get(fetch_update_time))
            .route("/maxLt/:address", get(max_lt))
            .route("/status", get(status))
            .route("/metrics", get(metrics_text))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the process shuts down.
    pub async fn start(&self) -> Result<(), std::io::Error> {
        let app = self.router();
        let addr = format!("0.0.0.0:{}", self.port);
        info!("query api listening on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn daos(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.catalog().await.daos().to_vec())
}

async fn dao(State(state): State<AppState>, Path(address): Path<String>) -> impl IntoResponse {
    match state.cache.dao(&Address::new(address)).await {
        Some(dao) => Json(serde_json::to_value(dao).unwrap_or_default()),
        None => Json(serde_json::Value::Object(Default::default())),
    }
}

async fn num_daos(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.dao_count().await)
}

async fn proposal(State(state): State<AppState>, Path(address): Path<String>) -> impl IntoResponse {
    match state.cache.proposal_view(&Address::new(address)).await {
        Some(view) => Json(serde_json::to_value(view).unwrap_or_default()),
        None => Json(serde_json::Value::Object(Default::default())),
    }
}

async fn nft_holders(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    Json(state.cache.nft_holders_for(&Address::new(address)).await)
}

async fn proposals_by_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.lifecycle().await)
}

async fn registry(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.registry().await)
}

async fn state_update_time(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.update_time().await)
}

async fn fetch_update_time(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    Json(state.cache.fetch_update_time(&Address::new(address)).await)
}

async fn max_lt(State(state): State<AppState>, Path(address): Path<String>) -> impl IntoResponse {
    Json(state.cache.max_lt(&Address::new(address)).await)
}

/// Liveness view: service status plus the last successful publish time.
#[derive(Serialize)]
struct StatusView {
    status: ServiceStatus,
    update_time: Option<Timestamp>,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusView {
        status: state.cache.status().await,
        update_time: state.cache.update_time().await,
    })
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&state.metrics.registry.gather(), &mut buf) {
        Ok(()) => (StatusCode::OK, buf).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn server() -> RpcServer {
        RpcServer::new(
            0,
            Arc::new(Cache::new()),
            Arc::new(CacheMetrics::new()),
        )
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn unknown_proposal_returns_empty_object() {
        let (status, body) = get_json(server().router(), "/proposal/unknown").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));
    }

    #[tokio::test]
    async fn empty_catalog_lists_no_daos() {
        let (status, body) = get_json(server().router(), "/daos").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (_, count) = get_json(server().router(), "/numDaos").await;
        assert_eq!(count, serde_json::json!(0));
    }

    #[tokio::test]
    async fn status_reports_starting_before_first_cycle() {
        let (status, body) = get_json(server().router(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "starting");
        assert!(body["update_time"].is_null());
    }

    #[tokio::test]
    async fn lifecycle_view_has_three_sets() {
        let (_, body) = get_json(server().router(), "/proposalsByState").await;
        assert!(body["pending"].is_array());
        assert!(body["active"].is_array());
        assert!(body["ended"].is_array());
    }
}
