//! Relayer status queries
//!
//! The tracker only depends on the `StatusProvider` trait. Concrete providers:
//! - `HttpStatusProvider`: JSON status service with URL failover
//! - `ScriptedStatusProvider`: scripted fixture for tests and dry runs

mod http;
mod relay;
mod scripted;

pub use http::HttpStatusProvider;
pub use relay::{classify_relay_status, RelayStatusResponse, NOT_YET_INDEXED};
pub use scripted::{ScriptedResponse, ScriptedStatusProvider};

use crate::chain::{ChainId, TransactionHash};
use crate::error::StatusResult;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Lifecycle tag of a cross-chain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a message's delivery status.
///
/// Each query yields a fresh value; observations are never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Not yet executed on the target chain
    Pending {
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },

    /// Executed on the target chain
    Delivered {
        target_tx_hash: TransactionHash,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_chain: Option<ChainId>,
    },

    /// Rejected or reverted by the relaying network
    Failed { detail: String },
}

impl DeliveryStatus {
    pub fn pending() -> Self {
        DeliveryStatus::Pending { stage: None }
    }

    pub fn pending_at(stage: impl Into<String>) -> Self {
        DeliveryStatus::Pending {
            stage: Some(stage.into()),
        }
    }

    pub fn delivered(target_tx_hash: TransactionHash) -> Self {
        DeliveryStatus::Delivered {
            target_tx_hash,
            target_chain: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        DeliveryStatus::Failed {
            detail: detail.into(),
        }
    }

    pub fn state(&self) -> DeliveryState {
        match self {
            DeliveryStatus::Pending { .. } => DeliveryState::Pending,
            DeliveryStatus::Delivered { .. } => DeliveryState::Delivered,
            DeliveryStatus::Failed { .. } => DeliveryState::Failed,
        }
    }

    /// Provider diagnostic for a pending message
    pub fn stage(&self) -> Option<&str> {
        match self {
            DeliveryStatus::Pending { stage } => stage.as_deref(),
            _ => None,
        }
    }
}

/// Source of delivery status for cross-chain messages.
///
/// Implementations may report `Pending` repeatedly but should never move a
/// message from a terminal state back to `Pending`. The tracker trusts the
/// first terminal observation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Query the status of the message emitted by `tx_hash` on `chain_id`
    async fn query(&self, chain_id: ChainId, tx_hash: &TransactionHash)
        -> StatusResult<DeliveryStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_states() {
        let target = TransactionHash::parse("0xabc0").unwrap();

        assert_eq!(DeliveryStatus::pending().state(), DeliveryState::Pending);
        assert_eq!(
            DeliveryStatus::delivered(target).state(),
            DeliveryState::Delivered
        );
        assert_eq!(DeliveryStatus::failed("x").state(), DeliveryState::Failed);
        assert_eq!(
            DeliveryStatus::pending_at("Waiting for VAA").stage(),
            Some("Waiting for VAA")
        );
    }

    #[test]
    fn test_status_serializes_tagged() {
        let status = DeliveryStatus::Delivered {
            target_tx_hash: TransactionHash::parse("0xabc0").unwrap(),
            target_chain: Some(ChainId(14)),
        };
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["state"], "delivered");
        assert_eq!(json["target_tx_hash"], "0xabc0");
        assert_eq!(json["target_chain"], 14);

        let json = serde_json::to_value(DeliveryStatus::pending()).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "pending" }));
    }
}
