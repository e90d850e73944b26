//! Cross-chain delivery tracking
//!
//! The tracker polls a `StatusProvider` for one source transaction until:
//! 1. the message is reported delivered (success),
//! 2. the message is reported failed,
//! 3. the maximum wait elapses, or
//! 4. the provider errors more often in a row than the configured budget allows.

mod clock;
mod delivery;
mod options;

pub use clock::{Clock, TokioClock};
pub use delivery::{DeliveryOutcome, DeliveryTracker};
pub use options::{
    EarlyExit, WaitOptions, DEFAULT_JITTER, DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_MAX_WAIT,
    DEFAULT_POLL_INTERVAL,
};
