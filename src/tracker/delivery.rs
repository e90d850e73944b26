//! Delivery tracker: polls a status provider until a message is delivered or fails

use super::clock::{Clock, TokioClock};
use super::options::WaitOptions;
use crate::chain::{ChainId, TransactionHash};
use crate::error::{DeliveryError, DeliveryResult};
use crate::status::{DeliveryStatus, StatusProvider};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Successful delivery of a cross-chain message
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub source_chain: ChainId,
    pub source_tx_hash: TransactionHash,
    pub target_tx_hash: TransactionHash,
    pub target_chain: Option<ChainId>,
    /// Time from the start of the wait until the delivered status was observed
    pub elapsed: Duration,
    /// Status queries issued, including the one that observed delivery
    pub polls: u32,
    pub delivered_at: DateTime<Utc>,
}

/// Resolves the delivery outcome of cross-chain messages.
///
/// Holds no per-message state: every `await_delivery` call keeps its own
/// counters, so one tracker can follow many transactions concurrently.
/// Dropping the returned future abandons the wait without issuing further
/// queries.
#[derive(Clone)]
pub struct DeliveryTracker {
    provider: Arc<dyn StatusProvider>,
    clock: Arc<dyn Clock>,
}

impl DeliveryTracker {
    pub fn new(provider: Arc<dyn StatusProvider>) -> Self {
        Self::with_clock(provider, Arc::new(TokioClock))
    }

    pub fn with_clock(provider: Arc<dyn StatusProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { provider, clock }
    }

    /// Wait until the message emitted by `source_tx_hash` on `source_chain` reaches a terminal state.
    ///
    /// The source transaction must already be confirmed on its chain.
    pub async fn await_delivery(
        &self,
        source_chain: ChainId,
        source_tx_hash: &TransactionHash,
        options: &WaitOptions,
    ) -> DeliveryResult<DeliveryOutcome> {
        info!(
            "Tracking delivery of {} from chain {} (max wait {:?})",
            source_tx_hash, source_chain, options.max_wait
        );
        crate::metrics::record_delivery_started(source_chain);

        let started = Started {
            at: self.clock.now(),
            at_utc: self.clock.now_utc(),
        };
        let result = self
            .poll_until_terminal(source_chain, source_tx_hash, options, &started)
            .await;

        let elapsed = self.elapsed_since(started.at);
        match &result {
            Ok(_) => crate::metrics::record_delivery_resolved(source_chain, "delivered", elapsed),
            Err(e) => crate::metrics::record_delivery_resolved(source_chain, e.kind(), elapsed),
        }

        result
    }

    async fn poll_until_terminal(
        &self,
        chain_id: ChainId,
        tx_hash: &TransactionHash,
        options: &WaitOptions,
        started: &Started,
    ) -> DeliveryResult<DeliveryOutcome> {
        let started_utc = started.at_utc;
        let started = started.at;
        let error_budget = options.error_budget();
        let mut polls: u32 = 0;
        let mut consecutive_errors: u32 = 0;
        let mut last_stage: Option<String> = None;

        if !options.initial_delay.is_zero() {
            self.sleep_within(options.initial_delay, started, options.max_wait)
                .await;
        }

        loop {
            let elapsed = self.elapsed_since(started);
            if elapsed >= options.max_wait {
                warn!(
                    "Delivery of {} from chain {} still pending after {:?} ({} polls)",
                    tx_hash, chain_id, elapsed, polls
                );
                return Err(DeliveryError::Timeout {
                    chain_id,
                    tx_hash: tx_hash.to_string(),
                    elapsed,
                    polls,
                    early_exit: false,
                });
            }

            // A provider that never answers must not stretch the wait past the deadline
            polls += 1;
            let remaining = options.max_wait - elapsed;
            let answer = tokio::select! {
                biased;
                result = self.provider.query(chain_id, tx_hash) => Some(result),
                _ = self.clock.sleep(remaining) => None,
            };
            let Some(result) = answer else {
                debug!("Status query {} for {} outlived the deadline", polls, tx_hash);
                continue;
            };

            match result {
                Err(e) => {
                    consecutive_errors += 1;
                    crate::metrics::record_query_error(chain_id);

                    if consecutive_errors >= error_budget {
                        error!(
                            "Giving up on {} from chain {} after {} consecutive query errors: {}",
                            tx_hash, chain_id, consecutive_errors, e
                        );
                        return Err(DeliveryError::Provider {
                            chain_id,
                            tx_hash: tx_hash.to_string(),
                            attempts: consecutive_errors,
                            source: e,
                        });
                    }

                    warn!(
                        "Status query for {} on chain {} failed ({}/{}): {}",
                        tx_hash, chain_id, consecutive_errors, error_budget, e
                    );
                }
                Ok(status) => {
                    consecutive_errors = 0;
                    crate::metrics::record_status_poll(chain_id, status.state());

                    match status {
                        DeliveryStatus::Delivered {
                            target_tx_hash,
                            target_chain,
                        } => {
                            let elapsed = self.elapsed_since(started);
                            info!(
                                "Delivered {} from chain {} as {} after {:?} ({} polls)",
                                tx_hash, chain_id, target_tx_hash, elapsed, polls
                            );
                            return Ok(DeliveryOutcome {
                                source_chain: chain_id,
                                source_tx_hash: tx_hash.clone(),
                                target_tx_hash,
                                target_chain,
                                elapsed,
                                polls,
                                delivered_at: timestamp_after(started_utc, elapsed),
                            });
                        }
                        DeliveryStatus::Failed { detail } => {
                            warn!(
                                "Delivery of {} from chain {} failed: {}",
                                tx_hash, chain_id, detail
                            );
                            return Err(DeliveryError::Failed {
                                chain_id,
                                tx_hash: tx_hash.to_string(),
                                detail,
                            });
                        }
                        pending @ DeliveryStatus::Pending { .. } => {
                            report_stage(tx_hash, &pending, &mut last_stage, polls);

                            if options.should_exit_early(&pending) {
                                let elapsed = self.elapsed_since(started);
                                info!(
                                    "Stopped waiting for {} from chain {} early after {:?}",
                                    tx_hash, chain_id, elapsed
                                );
                                return Err(DeliveryError::Timeout {
                                    chain_id,
                                    tx_hash: tx_hash.to_string(),
                                    elapsed,
                                    polls,
                                    early_exit: true,
                                });
                            }
                        }
                    }
                }
            }

            let interval = options.jittered(options.interval_for(polls));
            self.sleep_within(interval, started, options.max_wait).await;
        }
    }

    /// Sleep for `duration`, cut short at the deadline
    async fn sleep_within(&self, duration: Duration, started: Instant, max_wait: Duration) {
        let remaining = max_wait.saturating_sub(self.elapsed_since(started));
        self.clock.sleep(duration.min(remaining)).await;
    }

    fn elapsed_since(&self, started: Instant) -> Duration {
        self.clock.now().saturating_duration_since(started)
    }
}

/// Start of a wait on both the monotonic and the wall clock
struct Started {
    at: Instant,
    at_utc: DateTime<Utc>,
}

/// Wall-clock time `elapsed` after `start`; keeps `delivered_at` consistent with `elapsed`
fn timestamp_after(start: DateTime<Utc>, elapsed: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(elapsed)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(start)
}

/// Log the provider's stage text when it changes between polls
fn report_stage(
    tx_hash: &TransactionHash,
    status: &DeliveryStatus,
    last_stage: &mut Option<String>,
    polls: u32,
) {
    let stage = status.stage();
    if stage != last_stage.as_deref() {
        info!(
            "Delivery of {}: {}",
            tx_hash,
            stage.unwrap_or("pending")
        );
        *last_stage = stage.map(str::to_string);
    } else {
        debug!("Delivery of {} still pending (poll {})", tx_hash, polls);
    }
}
