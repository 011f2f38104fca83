//! Central configuration constants for reconnection limits and defaults.

/// Default number of consecutive failed reopen attempts tolerated before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 30;

/// Upper bound accepted for a configured reconnection budget.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 1_000;

/// Base delay of the reconnect backoff (milliseconds).
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Ceiling for a single reconnect backoff (milliseconds). 10 s.
pub const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 10_000;

/// Silence on an open stream longer than this is treated as a lost connection.
/// Producers are expected to heartbeat well inside this window.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 90;

/// Endpoint placeholder replaced by the (percent-encoded) job identifier.
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Overall message shown once the reconnection budget is spent.
pub const EXHAUSTED_MESSAGE: &str = "Connection lost, cannot continue automatically";

/// Overall message shown while a new session waits for its first connection.
pub const CONNECTING_MESSAGE: &str = "Connecting...";

/// Overall message shown once the job reports completion.
pub const COMPLETE_MESSAGE: &str = "Complete";

/// Overall message shown while the transport is being re-established.
pub const RECONNECTING_MESSAGE: &str = "Connection interrupted, reconnecting...";

/// Convenience function to clamp a reconnection budget into the allowed range.
pub fn clamp_attempts(v: u32) -> u32 {
    v.min(MAX_RECONNECT_ATTEMPTS)
}
