//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Deliveries tracked and their outcomes
//! - Status polls by observed state
//! - Status query errors and endpoint failovers

use crate::chain::ChainId;
use crate::status::DeliveryState;

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec,
    TextEncoder,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

lazy_static! {
    pub static ref DELIVERIES_STARTED: CounterVec = register_counter_vec!(
        "delivery_tracker_deliveries_started_total",
        "Total delivery waits started",
        &["chain_id"]
    ).unwrap();

    pub static ref DELIVERIES_RESOLVED: CounterVec = register_counter_vec!(
        "delivery_tracker_deliveries_resolved_total",
        "Total delivery waits resolved by outcome",
        &["chain_id", "outcome"]
    ).unwrap();

    pub static ref DELIVERY_LATENCY: HistogramVec = register_histogram_vec!(
        "delivery_tracker_delivery_latency_seconds",
        "Time from start of wait to resolution",
        &["chain_id", "outcome"],
        vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]
    ).unwrap();

    pub static ref STATUS_POLLS: CounterVec = register_counter_vec!(
        "delivery_tracker_status_polls_total",
        "Total successful status polls by observed state",
        &["chain_id", "state"]
    ).unwrap();

    pub static ref QUERY_ERRORS: CounterVec = register_counter_vec!(
        "delivery_tracker_query_errors_total",
        "Total failed status queries",
        &["chain_id"]
    ).unwrap();

    pub static ref ENDPOINT_FAILOVERS: CounterVec = register_counter_vec!(
        "delivery_tracker_endpoint_failovers_total",
        "Total status endpoint failovers",
        &["chain_id"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Encode all registered metrics in the text exposition format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// Helper functions to record metrics

pub fn record_delivery_started(chain_id: ChainId) {
    DELIVERIES_STARTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_delivery_resolved(chain_id: ChainId, outcome: &str, elapsed: Duration) {
    let chain = chain_id.to_string();
    DELIVERIES_RESOLVED
        .with_label_values(&[&chain, outcome])
        .inc();
    DELIVERY_LATENCY
        .with_label_values(&[&chain, outcome])
        .observe(elapsed.as_secs_f64());
}

pub fn record_status_poll(chain_id: ChainId, state: DeliveryState) {
    STATUS_POLLS
        .with_label_values(&[&chain_id.to_string(), state.as_str()])
        .inc();
}

pub fn record_query_error(chain_id: ChainId) {
    QUERY_ERRORS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_failover(chain_id: ChainId) {
    ENDPOINT_FAILOVERS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_metrics_are_rendered() {
        record_delivery_started(ChainId(4_000_001));
        record_status_poll(ChainId(4_000_001), DeliveryState::Pending);
        record_delivery_resolved(ChainId(4_000_001), "timeout", Duration::from_secs(10));

        let text = render().unwrap();
        assert!(text.contains("delivery_tracker_deliveries_started_total"));
        assert!(text.contains("chain_id=\"4000001\""));
        assert!(text.contains("outcome=\"timeout\""));
    }
}
