//! Lifecycle logging.
//!
//! Events go through `tracing` under the `xenoform` target. A module whose
//! functions asked for `verbose` reports at info level, everything else at
//! debug. Installing a subscriber is left to the application.

/// Target used for every event this crate emits.
pub const LOG_TARGET: &str = "xenoform";

/// Emit a lifecycle event at info level when `$verbose`, debug otherwise.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!(target: "xenoform", $($arg)+)
        } else {
            tracing::debug!(target: "xenoform", $($arg)+)
        }
    };
}
