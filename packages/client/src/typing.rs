//! Outbound typing-signal throttle.
//!
//! The first keystroke of a burst emits `typing=true`; further keystrokes
//! in the same group only refresh an idle window. When the window elapses
//! with no further keystrokes, `typing=false` is emitted. A keystroke in a
//! different group ends the old burst and starts a new one, so each burst
//! is scoped to exactly one group. The throttle itself is pure: callers
//! schedule the idle timer and report back its expiry with the generation
//! they were given, so tests need no clock.

use std::time::Duration;

/// Idle window after the last keystroke before a stop signal.
pub const TYPING_IDLE: Duration = Duration::from_secs(1);

/// Outcome of a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingSignal {
    /// First keystroke of a burst; send `typing=true` and arm the idle
    /// timer for this generation.
    Start(u64),
    /// Burst already active in this group; re-arm the idle timer for this
    /// generation.
    Refresh(u64),
    /// The burst moved to a new group; send `typing=false` to `previous`,
    /// `typing=true` to the new group, and arm the idle timer for this
    /// generation.
    Switch { previous: String, generation: u64 },
}

impl TypingSignal {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Start(generation)
            | Self::Refresh(generation)
            | Self::Switch { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Default)]
pub struct TypingThrottle {
    generation: u64,
    active_group: Option<String>,
}

impl TypingThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a keystroke in `group`.
    pub fn keystroke(&mut self, group: &str) -> TypingSignal {
        self.generation += 1;
        match self.active_group.take() {
            Some(active) if active == group => {
                self.active_group = Some(active);
                TypingSignal::Refresh(self.generation)
            }
            Some(previous) => {
                self.active_group = Some(group.to_string());
                TypingSignal::Switch {
                    previous,
                    generation: self.generation,
                }
            }
            None => {
                self.active_group = Some(group.to_string());
                TypingSignal::Start(self.generation)
            }
        }
    }

    /// The idle timer armed for `generation` fired. Returns true when the
    /// burst really ended and `typing=false` should be sent; a timer from a
    /// superseded generation is ignored.
    pub fn idle_expired(&mut self, generation: u64) -> bool {
        if self.active_group.is_some() && generation == self.generation {
            self.active_group = None;
            return true;
        }
        false
    }

    /// End the burst immediately (user stopped). Returns the group a stop
    /// signal should be sent to, if a burst was active.
    pub fn stop(&mut self) -> Option<String> {
        // Bump the generation so any armed idle timer becomes stale.
        self.generation += 1;
        self.active_group.take()
    }

    pub fn idle_window(&self) -> Duration {
        TYPING_IDLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_keystroke_starts_burst() {
        // given:
        let mut throttle = TypingThrottle::new();

        // when / then:
        assert!(matches!(throttle.keystroke("g1"), TypingSignal::Start(_)));
    }

    #[test]
    fn test_burst_keystrokes_only_refresh() {
        // given: an active burst
        let mut throttle = TypingThrottle::new();
        throttle.keystroke("g1");

        // when / then:
        assert!(matches!(throttle.keystroke("g1"), TypingSignal::Refresh(_)));
        assert!(matches!(throttle.keystroke("g1"), TypingSignal::Refresh(_)));
    }

    #[test]
    fn test_idle_expiry_ends_burst_exactly_once() {
        // given:
        let mut throttle = TypingThrottle::new();
        let generation = throttle.keystroke("g1").generation();

        // when / then: the armed timer fires once, a second report is inert
        assert!(throttle.idle_expired(generation));
        assert!(!throttle.idle_expired(generation));
    }

    #[test]
    fn test_stale_idle_timer_is_ignored() {
        // given: a burst refreshed after the first timer was armed
        let mut throttle = TypingThrottle::new();
        let first = throttle.keystroke("g1").generation();
        let second = throttle.keystroke("g1").generation();

        // when / then: only the latest generation ends the burst
        assert!(!throttle.idle_expired(first));
        assert!(throttle.idle_expired(second));
    }

    #[test]
    fn test_group_change_mid_burst_switches() {
        // given: a burst active in g1
        let mut throttle = TypingThrottle::new();
        let first = throttle.keystroke("g1").generation();

        // when: the next keystroke lands in g2 inside the idle window
        let signal = throttle.keystroke("g2");

        // then: g1 is stopped, a fresh burst starts in g2, and the timer
        // armed for g1 is stale
        let TypingSignal::Switch {
            previous,
            generation,
        } = signal
        else {
            panic!("expected switch");
        };
        assert_eq!(previous, "g1");
        assert!(!throttle.idle_expired(first));
        assert!(throttle.idle_expired(generation));
    }

    #[test]
    fn test_stop_disarms_pending_timer() {
        // given:
        let mut throttle = TypingThrottle::new();
        let generation = throttle.keystroke("g1").generation();

        // when: the burst ends explicitly
        assert_eq!(throttle.stop(), Some("g1".to_string()));

        // then: the pending timer is stale and a new burst starts fresh
        assert!(!throttle.idle_expired(generation));
        assert!(matches!(throttle.keystroke("g1"), TypingSignal::Start(_)));
    }

    #[test]
    fn test_stop_without_burst_sends_nothing() {
        // given / when / then:
        let mut throttle = TypingThrottle::new();
        assert!(throttle.stop().is_none());
    }
}
