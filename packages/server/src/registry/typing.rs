//! Typing-indicator state machine.
//!
//! Per (group, user): NotTyping -> Typing -> NotTyping. Each entry carries a
//! generation counter; the expiry timer captures the generation it was
//! started for and only fires the stop transition if no refresh happened in
//! the meantime. That guarantees at most one live timer wins per entry, so
//! the auto-expiry stop event is broadcast exactly once.
//!
//! The 3-second expiry is the authoritative stop signal: an explicit "stopped
//! typing" event can be truncated by network loss, so consumers must not rely
//! on it arriving.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::domain::{GroupId, UserId};

/// How long a typing entry stays live without a refresh.
pub const TYPING_TTL: Duration = Duration::from_secs(3);

/// Outcome of a `begin` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingTransition {
    /// NotTyping -> Typing: broadcast `is_typing = true` and start a timer.
    Started(u64),
    /// Already typing: timer restarted, no re-broadcast needed.
    Refreshed(u64),
}

/// Tracks which users are typing in which groups.
pub struct TypingTracker {
    entries: Mutex<HashMap<(GroupId, UserId), u64>>,
    ttl: Duration,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: TYPING_TTL,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Transition (group, user) to Typing, or refresh the entry if already
    /// typing. The returned generation is what the expiry timer must present
    /// to [`clear_if_current`](Self::clear_if_current).
    pub async fn begin(&self, group_id: GroupId, user_id: UserId) -> TypingTransition {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&(group_id.clone(), user_id.clone())) {
            Some(generation) => {
                *generation += 1;
                TypingTransition::Refreshed(*generation)
            }
            None => {
                entries.insert((group_id, user_id), 0);
                TypingTransition::Started(0)
            }
        }
    }

    /// Force-transition to NotTyping (explicit stop, leave, disconnect).
    /// Returns `true` if the user was typing.
    pub async fn clear(&self, group_id: &GroupId, user_id: &UserId) -> bool {
        let mut entries = self.entries.lock().await;
        entries
            .remove(&(group_id.clone(), user_id.clone()))
            .is_some()
    }

    /// Timer-expiry transition: clears the entry only if no refresh happened
    /// since `generation` was handed out. Returns `true` if this timer won
    /// and the stop event should be broadcast.
    pub async fn clear_if_current(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        generation: u64,
    ) -> bool {
        let mut entries = self.entries.lock().await;
        let key = (group_id.clone(), user_id.clone());
        match entries.get(&key) {
            Some(current) if *current == generation => {
                entries.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Users currently typing in a group.
    pub async fn typing_in(&self, group_id: &GroupId) -> Vec<UserId> {
        let entries = self.entries.lock().await;
        entries
            .keys()
            .filter(|(g, _)| g == group_id)
            .map(|(_, u)| u.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str) -> GroupId {
        GroupId::new(id.to_string()).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_begin_starts_then_refreshes() {
        // given:
        let tracker = TypingTracker::new();

        // when:
        let first = tracker.begin(group("g1"), user("alice")).await;
        let second = tracker.begin(group("g1"), user("alice")).await;

        // then: only the first call reports a fresh start
        assert_eq!(first, TypingTransition::Started(0));
        assert_eq!(second, TypingTransition::Refreshed(1));
        assert_eq!(tracker.typing_in(&group("g1")).await, vec![user("alice")]);
    }

    #[tokio::test]
    async fn test_stale_timer_loses_against_refresh() {
        // given: alice started typing, then refreshed
        let tracker = TypingTracker::new();
        let TypingTransition::Started(stale_generation) =
            tracker.begin(group("g1"), user("alice")).await
        else {
            panic!("expected Started");
        };
        tracker.begin(group("g1"), user("alice")).await;

        // when: the first timer fires with its stale generation
        let fired = tracker
            .clear_if_current(&group("g1"), &user("alice"), stale_generation)
            .await;

        // then: the stale timer loses, the entry stays live
        assert!(!fired);
        assert_eq!(tracker.typing_in(&group("g1")).await, vec![user("alice")]);
    }

    #[tokio::test]
    async fn test_current_timer_wins_exactly_once() {
        // given:
        let tracker = TypingTracker::new();
        tracker.begin(group("g1"), user("alice")).await;
        let TypingTransition::Refreshed(generation) =
            tracker.begin(group("g1"), user("alice")).await
        else {
            panic!("expected Refreshed");
        };

        // when: the current timer fires twice (spurious double fire)
        let first = tracker
            .clear_if_current(&group("g1"), &user("alice"), generation)
            .await;
        let second = tracker
            .clear_if_current(&group("g1"), &user("alice"), generation)
            .await;

        // then: stop is signalled exactly once
        assert!(first);
        assert!(!second);
        assert!(tracker.typing_in(&group("g1")).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_forces_not_typing() {
        // given:
        let tracker = TypingTracker::new();
        tracker.begin(group("g1"), user("alice")).await;

        // when:
        let was_typing = tracker.clear(&group("g1"), &user("alice")).await;

        // then:
        assert!(was_typing);
        assert!(tracker.typing_in(&group("g1")).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_when_not_typing_is_noop() {
        // given:
        let tracker = TypingTracker::new();

        // when:
        let was_typing = tracker.clear(&group("g1"), &user("alice")).await;

        // then:
        assert!(!was_typing);
    }

    #[tokio::test]
    async fn test_entries_are_scoped_per_group() {
        // given: alice typing in two groups
        let tracker = TypingTracker::new();
        tracker.begin(group("g1"), user("alice")).await;
        tracker.begin(group("g2"), user("alice")).await;

        // when:
        tracker.clear(&group("g1"), &user("alice")).await;

        // then:
        assert!(tracker.typing_in(&group("g1")).await.is_empty());
        assert_eq!(tracker.typing_in(&group("g2")).await, vec![user("alice")]);
    }
}
