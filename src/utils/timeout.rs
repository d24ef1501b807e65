//! Caps on configured timeouts
//!
//! A typo in the config file (an extra zero) should fail at startup instead of
//! leaving a run hanging on a selector that never renders.

use std::time::Duration;

use crate::utils::errors::BookingError;

/// Cap for page loads, redirects and post-load settling (5 minutes)
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Cap for element waits and widget settling (30 seconds)
pub const MAX_INTERACTION_TIMEOUT_MS: u64 = 30_000;

fn capped(kind: &str, timeout_ms: Option<u64>, default_ms: u64, cap_ms: u64) -> Result<Duration, BookingError> {
    let ms = timeout_ms.unwrap_or(default_ms);
    if ms > cap_ms {
        return Err(BookingError::Config(format!(
            "{kind} timeout of {ms}ms exceeds the {cap_ms}ms limit ({:.1}s)",
            cap_ms as f64 / 1000.0
        )));
    }
    Ok(Duration::from_millis(ms))
}

/// Timeout for `goto`, the login redirect and the grid settling after load
pub fn validate_navigation_timeout(timeout_ms: Option<u64>, default_ms: u64) -> Result<Duration, BookingError> {
    capped("Navigation", timeout_ms, default_ms, MAX_NAVIGATION_TIMEOUT_MS)
}

/// Timeout for element waits, clicks and Kendo popups
pub fn validate_interaction_timeout(timeout_ms: Option<u64>, default_ms: u64) -> Result<Duration, BookingError> {
    capped("Interaction", timeout_ms, default_ms, MAX_INTERACTION_TIMEOUT_MS)
}
