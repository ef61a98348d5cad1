//! Reconnect backoff schedule.

use std::time::Duration;

/// Delay before the first retry.
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on any single delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Consecutive failed attempts before giving up. The counter resets only
/// after a session is confirmed by the server's handshake event.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 8;

/// Delay to wait before retry number `attempt` (0-based): 500 ms doubling
/// per attempt, capped at 30 s.
pub fn next_delay(attempt: u32) -> Duration {
    // 2^6 * 500ms already exceeds the cap; clamp the shift to avoid overflow.
    let factor = 1u32 << attempt.min(6);
    BASE_DELAY.saturating_mul(factor).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_from_base() {
        // given / when / then:
        assert_eq!(next_delay(0), Duration::from_millis(500));
        assert_eq!(next_delay(1), Duration::from_secs(1));
        assert_eq!(next_delay(2), Duration::from_secs(2));
        assert_eq!(next_delay(5), Duration::from_secs(16));
    }

    #[test]
    fn test_delay_caps_at_thirty_seconds() {
        // given / when / then: 2^6 * 500ms = 32s clamps to the cap
        assert_eq!(next_delay(6), Duration::from_secs(30));
        assert_eq!(next_delay(7), Duration::from_secs(30));
        assert_eq!(next_delay(100), Duration::from_secs(30));
    }
}
