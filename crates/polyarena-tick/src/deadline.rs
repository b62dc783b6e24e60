//! Keyed, cancelable deadlines.
//!
//! Each disconnected player gets one deadline, keyed by their id. A
//! reconnect cancels it; if it fires first the player is removed. Because
//! the queue is owned by the room actor and mutated through `&mut self`,
//! "cancel" and "fire" can never race: whichever the actor processes
//! first wins and the other finds nothing to do.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use tokio::time::{self, Instant};

/// A set of deadlines, at most one per key.
#[derive(Debug)]
pub struct DeadlineQueue<K> {
    /// Ordered by time so the earliest deadline is always first.
    ordered: BTreeSet<(Instant, K)>,
    /// Key → its deadline, to find the ordered entry on cancel.
    by_key: HashMap<K, Instant>,
}

impl<K: Ord + Hash + Clone> Default for DeadlineQueue<K> {
    fn default() -> Self {
        Self {
            ordered: BTreeSet::new(),
            by_key: HashMap::new(),
        }
    }
}

impl<K: Ord + Hash + Clone> DeadlineQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `key` to fire at `at`, replacing any existing deadline
    /// for it. Returns the replaced deadline.
    pub fn schedule(&mut self, key: K, at: Instant) -> Option<Instant> {
        let previous = self.cancel(&key);
        self.ordered.insert((at, key.clone()));
        self.by_key.insert(key, at);
        previous
    }

    /// Cancels the deadline for `key`. Returns it if one was pending.
    pub fn cancel(&mut self, key: &K) -> Option<Instant> {
        let at = self.by_key.remove(key)?;
        self.ordered.remove(&(at, key.clone()));
        Some(at)
    }

    /// The pending deadline for `key`.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.by_key.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.ordered.first().map(|(at, _)| *at)
    }

    /// Removes and returns every key whose deadline is at or before `now`,
    /// earliest first. Each key is returned at most once.
    pub fn pop_due(&mut self, now: Instant) -> Vec<K> {
        let mut due = Vec::new();
        while let Some((at, _)) = self.ordered.first() {
            if *at > now {
                break;
            }
            if let Some((_, key)) = self.ordered.pop_first() {
                self.by_key.remove(&key);
                due.push(key);
            }
        }
        due
    }

    /// Sleeps until the earliest deadline. Pends forever while the queue
    /// is empty, so it can sit in a `select!` unconditionally.
    pub async fn wait_next(&self) -> Instant {
        match self.next_deadline() {
            Some(at) => {
                time::sleep_until(at).await;
                at
            }
            None => std::future::pending().await,
        }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_pop_due_returns_only_expired_in_order() {
        let start = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.schedule("late", start + secs(30));
        queue.schedule("early", start + secs(10));
        queue.schedule("middle", start + secs(20));

        let due = queue.pop_due(start + secs(20));

        assert_eq!(due, vec!["early", "middle"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(start + secs(30)));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let start = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.schedule("alice", start + secs(5));

        assert_eq!(queue.cancel(&"alice"), Some(start + secs(5)));
        assert!(queue.pop_due(start + secs(60)).is_empty());
        assert_eq!(queue.cancel(&"alice"), None);
    }

    #[test]
    fn test_schedule_replaces_existing_deadline() {
        let start = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.schedule("alice", start + secs(5));

        let previous = queue.schedule("alice", start + secs(50));

        assert_eq!(previous, Some(start + secs(5)));
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_due(start + secs(10)).is_empty());
        assert_eq!(queue.pop_due(start + secs(50)), vec!["alice"]);
    }

    #[test]
    fn test_pop_due_fires_each_key_once() {
        let start = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.schedule("alice", start);

        assert_eq!(queue.pop_due(start), vec!["alice"]);
        assert!(queue.pop_due(start + secs(1)).is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_instant_for_two_keys_keeps_both() {
        let at = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.schedule("a", at);
        queue.schedule("b", at);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_due(at), vec!["a", "b"]);
    }
}
