//! Scripted status provider for tests and dry runs

use super::{DeliveryStatus, StatusProvider};
use crate::chain::{ChainId, TransactionHash};
use crate::error::{StatusError, StatusResult};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Status(DeliveryStatus),
    /// Transport-level failure
    Error(String),
    /// Never answers
    Hang,
}

impl ScriptedResponse {
    pub fn pending() -> Self {
        ScriptedResponse::Status(DeliveryStatus::pending())
    }

    pub fn pending_at(stage: &str) -> Self {
        ScriptedResponse::Status(DeliveryStatus::pending_at(stage))
    }

    /// Delivered with the given target hash
    ///
    /// Panics on an invalid hash; intended for literal fixtures.
    pub fn delivered(target_tx_hash: &str) -> Self {
        let hash = TransactionHash::parse(target_tx_hash)
            .unwrap_or_else(|e| panic!("invalid scripted target hash: {}", e));
        ScriptedResponse::Status(DeliveryStatus::delivered(hash))
    }

    pub fn failed(detail: &str) -> Self {
        ScriptedResponse::Status(DeliveryStatus::failed(detail))
    }

    pub fn error(message: &str) -> Self {
        ScriptedResponse::Error(message.to_string())
    }
}

/// Queue of responses; the last one repeats forever
#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<ScriptedResponse>,
}

impl Script {
    fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
        }
    }

    fn next(&mut self) -> Option<ScriptedResponse> {
        if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        }
    }
}

/// Status provider answering from a fixed script.
///
/// A default script serves every transaction; per-transaction scripts take
/// precedence. Every query is logged with its tokio instant so tests can
/// check poll spacing under paused time.
#[derive(Debug, Default)]
pub struct ScriptedStatusProvider {
    default_script: Mutex<Script>,
    per_tx: Mutex<HashMap<TransactionHash, Script>>,
    calls: AtomicUsize,
    call_log: Mutex<Vec<(TransactionHash, Instant)>>,
    latency: Option<Duration>,
}

impl ScriptedStatusProvider {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            default_script: Mutex::new(Script::new(responses)),
            ..Self::default()
        }
    }

    /// Use a dedicated script for one transaction
    pub fn with_script_for(
        mut self,
        tx_hash: TransactionHash,
        responses: impl IntoIterator<Item = ScriptedResponse>,
    ) -> Self {
        self.per_tx.get_mut().insert(tx_hash, Script::new(responses));
        self
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of queries received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which queries were received, in order
    pub async fn call_instants(&self) -> Vec<Instant> {
        self.call_log.lock().await.iter().map(|(_, at)| *at).collect()
    }

    /// Number of queries received for one transaction
    pub async fn calls_for(&self, tx_hash: &TransactionHash) -> usize {
        self.call_log
            .lock()
            .await
            .iter()
            .filter(|(hash, _)| hash == tx_hash)
            .count()
    }

    async fn next_response(&self, tx_hash: &TransactionHash) -> Option<ScriptedResponse> {
        if let Some(script) = self.per_tx.lock().await.get_mut(tx_hash) {
            return script.next();
        }
        self.default_script.lock().await.next()
    }
}

#[async_trait]
impl StatusProvider for ScriptedStatusProvider {
    async fn query(
        &self,
        _chain_id: ChainId,
        tx_hash: &TransactionHash,
    ) -> StatusResult<DeliveryStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_log
            .lock()
            .await
            .push((tx_hash.clone(), Instant::now()));

        let response = self.next_response(tx_hash).await;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match response {
            Some(ScriptedResponse::Status(status)) => Ok(status),
            Some(ScriptedResponse::Error(message)) => Err(StatusError::Transport(message)),
            Some(ScriptedResponse::Hang) => {
                std::future::pending::<StatusResult<DeliveryStatus>>().await
            }
            None => Err(StatusError::Transport("script is empty".to_string())),
        }
    }
}
