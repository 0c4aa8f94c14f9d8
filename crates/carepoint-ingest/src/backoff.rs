//! Bounded exponential backoff for page fetch retries.

use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Returns the delay before attempt `attempt` (0-indexed), doubling from
/// [`INITIAL_BACKOFF`] up to [`MAX_BACKOFF`].
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    INITIAL_BACKOFF.saturating_mul(multiplier).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(delay_for_attempt(20), MAX_BACKOFF);
    }
}
