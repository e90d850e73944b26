//! Error types for the delivery tracker

use crate::chain::ChainId;

use std::time::Duration;
use thiserror::Error;

/// Error returned by a single status query
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status service returned {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Failed to decode status response: {0}")]
    Decode(String),

    #[error("Unrecognized relay status: {0}")]
    UnrecognizedStatus(String),

    #[error("Chain {0} not found")]
    ChainNotFound(ChainId),

    #[error("Status query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid status provider configuration: {0}")]
    Config(String),
}

impl StatusError {
    /// Whether another status endpoint might answer where this one failed
    pub fn is_transient(&self) -> bool {
        match self {
            StatusError::Http(_) | StatusError::Timeout(_) | StatusError::Transport(_) => true,
            StatusError::UnexpectedResponse { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Terminal failure of a tracked delivery
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error(
        "Timed out waiting for delivery of {tx_hash} from chain {chain_id} after {elapsed:?} ({polls} polls)"
    )]
    Timeout {
        chain_id: ChainId,
        tx_hash: String,
        elapsed: Duration,
        polls: u32,
        /// Set when the caller's early-exit predicate ended the wait before the deadline
        early_exit: bool,
    },

    #[error("Delivery of {tx_hash} from chain {chain_id} failed: {detail}")]
    Failed {
        chain_id: ChainId,
        tx_hash: String,
        detail: String,
    },

    #[error("Status provider failed {attempts} consecutive times for {tx_hash} on chain {chain_id}: {source}")]
    Provider {
        chain_id: ChainId,
        tx_hash: String,
        attempts: u32,
        source: StatusError,
    },
}

impl DeliveryError {
    /// Check if the caller may retry the whole wait after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Provider { .. })
    }

    /// Short label for metrics and API responses
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Timeout { .. } => "timeout",
            DeliveryError::Failed { .. } => "failed",
            DeliveryError::Provider { .. } => "provider_error",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid transaction hash: {0:?}")]
pub struct InvalidTransactionHash(pub String);

/// Result type for status queries
pub type StatusResult<T> = Result<T, StatusError>;

/// Result type for delivery tracking
pub type DeliveryResult<T> = Result<T, DeliveryError>;
