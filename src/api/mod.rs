//! HTTP API for health checks, status lookups and delivery waits

use crate::chain::{ChainInfo, ChainRegistry, TransactionHash};
use crate::config::ApiConfig;
use crate::error::DeliveryError;
use crate::status::{DeliveryStatus, StatusProvider};
use crate::tracker::{DeliveryOutcome, DeliveryTracker, WaitOptions};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tracker: DeliveryTracker,
    pub provider: Arc<dyn StatusProvider>,
    pub registry: Arc<ChainRegistry>,
    /// Policy for delivery waits; requests may shorten but not extend `max_wait`
    pub wait_options: WaitOptions,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chains", get(get_chains))
        .route("/status/:chain/:tx_hash", get(get_status))
        .route("/deliveries/:chain/:tx_hash", get(await_delivery))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get configured chains
async fn get_chains(State(state): State<AppState>) -> impl IntoResponse {
    let chains = state.registry.chains().cloned().collect();
    Json(ChainsResponse { chains })
}

/// Single status lookup, no waiting
async fn get_status(
    State(state): State<AppState>,
    Path((chain, tx_hash)): Path<(String, String)>,
) -> Response {
    let (chain, tx_hash) = match parse_target(&state.registry, &chain, &tx_hash) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state.provider.query(chain.chain_id, &tx_hash).await {
        Ok(status) => (
            StatusCode::OK,
            Json(StatusResponse {
                chain: chain.clone(),
                tx_hash,
                status,
            }),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, "provider_error", e.to_string()),
    }
}

/// Wait for delivery, bounded by the configured (or shorter requested) max wait
async fn await_delivery(
    State(state): State<AppState>,
    Path((chain, tx_hash)): Path<(String, String)>,
    Query(params): Query<DeliveryParams>,
) -> Response {
    let (chain, tx_hash) = match parse_target(&state.registry, &chain, &tx_hash) {
        Ok(target) => target,
        Err(response) => return response,
    };

    let mut options = state.wait_options.clone();
    if let Some(secs) = params.max_wait_secs {
        let requested = Duration::from_secs(secs);
        options.max_wait = options.max_wait.min(requested);
    }

    match state
        .tracker
        .await_delivery(chain.chain_id, &tx_hash, &options)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(DeliveryResponse::from(&outcome))).into_response(),
        Err(e) => {
            let code = match e {
                DeliveryError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                DeliveryError::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DeliveryError::Provider { .. } => StatusCode::BAD_GATEWAY,
            };
            error_response(code, e.kind(), e.to_string())
        }
    }
}

fn parse_target(
    registry: &ChainRegistry,
    chain: &str,
    tx_hash: &str,
) -> Result<(ChainInfo, TransactionHash), Response> {
    let chain = registry.resolve(chain).cloned().ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "unknown_chain",
            format!("Chain {} is not configured", chain),
        )
    })?;

    let tx_hash = TransactionHash::parse(tx_hash).map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, "invalid_tx_hash", e.to_string())
    })?;

    Ok((chain, tx_hash))
}

fn error_response(code: StatusCode, kind: &str, error: String) -> Response {
    (
        code,
        Json(ErrorResponse {
            kind: kind.to_string(),
            error,
        }),
    )
        .into_response()
}

// Request and response types

#[derive(Debug, Deserialize)]
struct DeliveryParams {
    max_wait_secs: Option<u64>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ChainsResponse {
    chains: Vec<ChainInfo>,
}

#[derive(Serialize)]
struct StatusResponse {
    chain: ChainInfo,
    tx_hash: TransactionHash,
    status: DeliveryStatus,
}

#[derive(Serialize)]
struct DeliveryResponse {
    source_chain: u64,
    source_tx_hash: String,
    target_tx_hash: String,
    target_chain: Option<u64>,
    elapsed_ms: u64,
    polls: u32,
    delivered_at: String,
}

impl From<&DeliveryOutcome> for DeliveryResponse {
    fn from(outcome: &DeliveryOutcome) -> Self {
        Self {
            source_chain: outcome.source_chain.0,
            source_tx_hash: outcome.source_tx_hash.to_string(),
            target_tx_hash: outcome.target_tx_hash.to_string(),
            target_chain: outcome.target_chain.map(|c| c.0),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            polls: outcome.polls,
            delivered_at: outcome.delivered_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    kind: String,
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainId;
    use crate::status::{ScriptedResponse, ScriptedStatusProvider};

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(provider: ScriptedStatusProvider) -> AppState {
        let provider: Arc<dyn StatusProvider> = Arc::new(provider);
        AppState {
            tracker: DeliveryTracker::new(provider.clone()),
            provider,
            registry: Arc::new(ChainRegistry::new().with_chain(ChainId(6), "avalanche")),
            wait_options: WaitOptions::default()
                .with_poll_interval(Duration::from_secs(2))
                .with_max_wait(Duration::from_secs(10))
                .with_jitter(0.0),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state(ScriptedStatusProvider::new([ScriptedResponse::pending()])));
        let (status, body) = get(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_chains() {
        let app = router(state(ScriptedStatusProvider::new([ScriptedResponse::pending()])));
        let (_, body) = get(app, "/chains").await;

        assert_eq!(body["chains"][0]["name"], "avalanche");
        assert_eq!(body["chains"][0]["chain_id"], 6);
    }

    #[tokio::test]
    async fn test_status_lookup() {
        let app = router(state(ScriptedStatusProvider::new([
            ScriptedResponse::pending_at("Waiting for VAA"),
        ])));
        let (status, body) = get(app, "/status/avalanche/0xAB01").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tx_hash"], "0xab01");
        assert_eq!(body["status"]["state"], "pending");
        assert_eq!(body["status"]["stage"], "Waiting for VAA");
    }

    #[tokio::test]
    async fn test_unknown_chain_and_bad_hash() {
        let app = router(state(ScriptedStatusProvider::new([ScriptedResponse::pending()])));

        let (status, body) = get(app.clone(), "/deliveries/solana/0xab01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "unknown_chain");

        let (status, body) = get(app, "/deliveries/6/0xzz").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_tx_hash");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_success() {
        let app = router(state(ScriptedStatusProvider::new([
            ScriptedResponse::pending(),
            ScriptedResponse::delivered("0xabc0"),
        ])));
        let (status, body) = get(app, "/deliveries/6/0xab01").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["target_tx_hash"], "0xabc0");
        assert_eq!(body["polls"], 2);
        assert_eq!(body["elapsed_ms"], 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_error_codes() {
        let app = router(state(ScriptedStatusProvider::new([ScriptedResponse::failed(
            "insufficient fee",
        )])));
        let (status, body) = get(app, "/deliveries/avalanche/0xab01").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "failed");

        let app = router(state(ScriptedStatusProvider::new([ScriptedResponse::pending()])));
        let (status, body) = get(app, "/deliveries/avalanche/0xab01?max_wait_secs=4").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["kind"], "timeout");

        let app = router(state(ScriptedStatusProvider::new([ScriptedResponse::error(
            "connection reset",
        )])));
        let (status, body) = get(app, "/deliveries/avalanche/0xab01").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "provider_error");
    }
}
