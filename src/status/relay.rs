//! Relay status wire format and classification
//!
//! Status services answer with a JSON body:
//!
//! ```json
//! { "status": "Delivery Success", "targetTxHash": "0x...", "targetChain": 14, "detail": null }
//! ```
//!
//! `status` carries the relayer's own vocabulary, which is folded into the
//! three-state `DeliveryState` here.

use super::{DeliveryState, DeliveryStatus};
use crate::chain::{ChainId, TransactionHash};
use crate::error::{StatusError, StatusResult};

use serde::Deserialize;

/// Stage reported when the status service has not seen the transaction yet
pub const NOT_YET_INDEXED: &str = "not yet indexed";

/// Body returned by a relay status endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatusResponse {
    pub status: String,
    #[serde(default)]
    pub target_tx_hash: Option<String>,
    #[serde(default)]
    pub target_chain: Option<u64>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Map a relayer status string onto a lifecycle state
pub fn classify_relay_status(status: &str) -> Option<DeliveryState> {
    match status.trim().to_ascii_lowercase().as_str() {
        "waiting for vaa" | "pending delivery" | "pending" => Some(DeliveryState::Pending),
        "delivery success" | "forward request success" | "delivered" => {
            Some(DeliveryState::Delivered)
        }
        "receiver failure"
        | "forward request failure"
        | "delivery didn't happen within given block range"
        | "delivery didn't happen within given gas limit"
        | "this should never happen. contact support."
        | "failed" => Some(DeliveryState::Failed),
        _ => None,
    }
}

impl RelayStatusResponse {
    /// Convert the wire response into a status observation
    pub fn into_status(self) -> StatusResult<DeliveryStatus> {
        let state = classify_relay_status(&self.status)
            .ok_or_else(|| StatusError::UnrecognizedStatus(self.status.clone()))?;

        match state {
            DeliveryState::Pending => {
                let stage = match self.detail {
                    Some(detail) if !detail.is_empty() => format!("{}: {}", self.status, detail),
                    _ => self.status,
                };
                Ok(DeliveryStatus::Pending { stage: Some(stage) })
            }
            DeliveryState::Delivered => {
                let raw = self.target_tx_hash.ok_or_else(|| {
                    StatusError::Decode(format!(
                        "status {:?} without a target transaction hash",
                        self.status
                    ))
                })?;
                let target_tx_hash = TransactionHash::parse(&raw)
                    .map_err(|e| StatusError::Decode(e.to_string()))?;

                Ok(DeliveryStatus::Delivered {
                    target_tx_hash,
                    target_chain: self.target_chain.map(ChainId),
                })
            }
            DeliveryState::Failed => Ok(DeliveryStatus::Failed {
                detail: self
                    .detail
                    .filter(|d| !d.is_empty())
                    .unwrap_or(self.status),
            }),
        }
    }
}
