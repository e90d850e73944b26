//! Delivery Tracker - confirms delivery of cross-chain messages
//!
//! After a source transaction is confirmed, the tracker polls a relayer
//! status service until the resulting message is delivered on the target
//! chain, fails, or the wait times out.

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod status;
pub mod tracker;

pub use chain::{ChainId, ChainRegistry, TransactionHash};
pub use error::{DeliveryError, StatusError};
pub use status::{DeliveryState, DeliveryStatus, StatusProvider};
pub use tracker::{DeliveryOutcome, DeliveryTracker, WaitOptions};
