//! HTTP relay status provider with multi-endpoint failover

use super::relay::{RelayStatusResponse, NOT_YET_INDEXED};
use super::{DeliveryStatus, StatusProvider};
use crate::chain::{ChainId, ChainRegistry, TransactionHash};
use crate::config::{ChainKey, StatusConfig};
use crate::error::{StatusError, StatusResult};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Queries a JSON relay status service, rotating through configured URLs on failure
pub struct HttpStatusProvider {
    client: reqwest::Client,
    /// URL templates with `{chain}` and `{tx_hash}` placeholders
    url_templates: Vec<String>,
    /// Current active template index
    current: AtomicUsize,
    chain_key: ChainKey,
    request_timeout: Duration,
    registry: Arc<ChainRegistry>,
}

impl HttpStatusProvider {
    pub fn new(config: &StatusConfig, registry: Arc<ChainRegistry>) -> StatusResult<Self> {
        if config.urls.is_empty() {
            return Err(StatusError::Config(
                "No status service URLs configured".to_string(),
            ));
        }
        if config.chain_key == ChainKey::Name && registry.is_empty() {
            warn!("Status URLs are keyed by chain name but no chains are registered");
        }

        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("delivery-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url_templates: config.urls.clone(),
            current: AtomicUsize::new(0),
            chain_key: config.chain_key,
            request_timeout,
            registry,
        })
    }

    fn active_template(&self) -> &str {
        let idx = self.current.load(Ordering::Relaxed);
        &self.url_templates[idx % self.url_templates.len()]
    }

    /// Switch to next configured endpoint
    fn failover(&self, chain_id: ChainId) {
        let current = self.current.load(Ordering::Relaxed);
        let next = (current + 1) % self.url_templates.len();
        self.current.store(next, Ordering::Relaxed);
        warn!("Status service failover to endpoint {}", next);
        crate::metrics::record_failover(chain_id);
    }

    /// Render a status URL for one query
    pub fn render_url(
        &self,
        template: &str,
        chain_id: ChainId,
        tx_hash: &TransactionHash,
    ) -> StatusResult<String> {
        let chain = match self.chain_key {
            ChainKey::Name => self
                .registry
                .name_of(chain_id)
                .ok_or(StatusError::ChainNotFound(chain_id))?
                .to_string(),
            ChainKey::Id => chain_id.to_string(),
        };

        Ok(template
            .replace("{chain}", &chain)
            .replace("{tx_hash}", tx_hash.as_str()))
    }

    async fn fetch(&self, url: &str) -> StatusResult<DeliveryStatus> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(DeliveryStatus::pending_at(NOT_YET_INDEXED));
        }
        if !status.is_success() {
            let body = body_or_read_error(response.text().await);
            return Err(StatusError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed: RelayStatusResponse = serde_json::from_str(&body)
            .map_err(|e| StatusError::Decode(format!("{} in body {:?}", e, body)))?;

        parsed.into_status()
    }

    fn transport_error(&self, error: reqwest::Error) -> StatusError {
        if error.is_timeout() {
            StatusError::Timeout(self.request_timeout)
        } else {
            StatusError::Http(error)
        }
    }
}

/// Body text of an error response, or the reason it could not be read
fn body_or_read_error(body: Result<String, reqwest::Error>) -> String {
    match body {
        Ok(body) => body,
        Err(e) => format!("<failed to read response body: {}>", e),
    }
}

#[async_trait]
impl StatusProvider for HttpStatusProvider {
    async fn query(
        &self,
        chain_id: ChainId,
        tx_hash: &TransactionHash,
    ) -> StatusResult<DeliveryStatus> {
        let mut last_error = None;

        for _ in 0..self.url_templates.len() {
            let url = self.render_url(self.active_template(), chain_id, tx_hash)?;
            debug!("Querying status for {} on chain {}: {}", tx_hash, chain_id, url);

            match self.fetch(&url).await {
                Ok(status) => return Ok(status),
                Err(e) if e.is_transient() => {
                    warn!(
                        "Status query for {} on chain {} failed: {}",
                        tx_hash, chain_id, e
                    );
                    last_error = Some(e);
                    self.failover(chain_id);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StatusError::Transport("All status endpoints failed".to_string())
        }))
    }
}
