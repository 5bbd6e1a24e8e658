//! Single-slot handoff between the caller thread and the interaction thread.
//!
//! One cycle at a time: the caller runs `reset()` then `acquire()`, the
//! interaction thread runs `publish()` exactly once per terminal action.
//! Every cycle gets a fresh `CycleId`; publishes tagged with an older id are
//! dropped, so a late timer or click from an abandoned cycle can never
//! satisfy a newer `acquire`.

use crate::feedback::session::Outcome;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Identifies one reset→acquire cycle.
pub type CycleId = u64;

#[derive(Debug, Default)]
struct Slot {
    cycle: CycleId,
    published: bool,
    value: Option<Outcome>,
}

#[derive(Debug, Default)]
pub struct CollectionCoordinator {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl CollectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new cycle: drop any unconsumed value and re-arm the guard.
    pub fn reset(&self) -> CycleId {
        let mut slot = self.lock();
        if let Some(stale) = slot.value.take() {
            log::warn!(
                "[FEEDBACK] Discarding unconsumed {} result from cycle {}",
                stale.kind(),
                slot.cycle
            );
        }
        slot.published = false;
        slot.cycle += 1;
        log::debug!("[FEEDBACK] Cycle {} started", slot.cycle);
        slot.cycle
    }

    /// Block until a result is published or `timeout` elapses.
    ///
    /// `None` waits indefinitely, as does a timeout too large to represent
    /// as an `Instant`. A timeout returns `Outcome::TimedOut` without
    /// publishing anything.
    pub fn acquire(&self, timeout: Option<Duration>) -> Outcome {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = slot.value.take() {
                log::debug!("[FEEDBACK] Cycle {} acquired {}", slot.cycle, outcome.kind());
                return outcome;
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        log::info!("[FEEDBACK] Cycle {} timed out waiting for a result", slot.cycle);
                        return Outcome::TimedOut;
                    }
                    let (guard, _) = self
                        .ready
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(|e| e.into_inner());
                    slot = guard;
                }
                None => {
                    slot = self.ready.wait(slot).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    /// Hand a result to the waiting caller. Never blocks.
    ///
    /// Returns `false` when the result was dropped: a publish already
    /// happened in this cycle (first result wins) or `cycle` is stale.
    pub fn publish(&self, cycle: CycleId, outcome: Outcome) -> bool {
        let mut slot = self.lock();
        if cycle != slot.cycle {
            log::debug!(
                "[FEEDBACK] Dropping {} from stale cycle {} (current {})",
                outcome.kind(),
                cycle,
                slot.cycle
            );
            return false;
        }
        if slot.published {
            log::debug!(
                "[FEEDBACK] Cycle {} already published, ignoring {}",
                cycle,
                outcome.kind()
            );
            return false;
        }
        log::info!("[FEEDBACK] Cycle {} published {}", cycle, outcome.kind());
        slot.value = Some(outcome);
        slot.published = true;
        self.ready.notify_all();
        true
    }

    pub fn is_published(&self) -> bool {
        self.lock().published
    }

    pub fn current_cycle(&self) -> CycleId {
        self.lock().cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::session::Submission;
    use std::sync::Arc;

    fn submitted(text: &str) -> Outcome {
        Outcome::Submitted(Submission {
            text: Some(text.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn acquire_times_out_without_publish() {
        let coordinator = CollectionCoordinator::new();
        coordinator.reset();
        let start = Instant::now();
        let outcome = coordinator.acquire(Some(Duration::from_millis(100)));
        assert_eq!(outcome, Outcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!coordinator.is_published());
    }

    #[test]
    fn publish_before_acquire_is_delivered() {
        let coordinator = CollectionCoordinator::new();
        let cycle = coordinator.reset();
        assert!(coordinator.publish(cycle, submitted("hello")));
        assert_eq!(coordinator.acquire(Some(Duration::from_secs(1))), submitted("hello"));
    }

    #[test]
    fn first_result_wins() {
        let coordinator = CollectionCoordinator::new();
        let cycle = coordinator.reset();
        assert!(coordinator.publish(cycle, submitted("first")));
        assert!(!coordinator.publish(
            cycle,
            Outcome::Cancelled {
                reason: "second".to_string()
            }
        ));
        assert_eq!(coordinator.acquire(Some(Duration::from_secs(1))), submitted("first"));
        // Nothing left behind for a later acquire in the same cycle.
        assert_eq!(
            coordinator.acquire(Some(Duration::from_millis(20))),
            Outcome::TimedOut
        );
    }

    #[test]
    fn reset_drains_stale_result() {
        let coordinator = CollectionCoordinator::new();
        let old = coordinator.reset();
        coordinator.publish(old, submitted("stale"));

        coordinator.reset();
        assert!(!coordinator.is_published());
        assert_eq!(
            coordinator.acquire(Some(Duration::from_millis(50))),
            Outcome::TimedOut
        );
    }

    #[test]
    fn publish_from_previous_cycle_is_rejected() {
        let coordinator = CollectionCoordinator::new();
        let old = coordinator.reset();
        let current = coordinator.reset();
        assert!(!coordinator.publish(old, Outcome::TimedOut));
        assert!(coordinator.publish(current, submitted("fresh")));
        assert_eq!(coordinator.acquire(Some(Duration::from_secs(1))), submitted("fresh"));
    }

    #[test]
    fn publish_from_other_thread_wakes_acquire() {
        let coordinator = Arc::new(CollectionCoordinator::new());
        let cycle = coordinator.reset();

        let publisher = {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                coordinator.publish(cycle, submitted("from interaction thread"))
            })
        };

        let outcome = coordinator.acquire(Some(Duration::from_secs(5)));
        assert!(publisher.join().unwrap());
        assert_eq!(outcome, submitted("from interaction thread"));
    }

    #[test]
    fn indefinite_acquire_returns_on_publish() {
        let coordinator = Arc::new(CollectionCoordinator::new());
        let cycle = coordinator.reset();
        let publisher = {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                coordinator.publish(
                    cycle,
                    Outcome::Cancelled {
                        reason: "Operation cancelled".to_string(),
                    },
                );
            })
        };
        let outcome = coordinator.acquire(None);
        publisher.join().unwrap();
        assert!(matches!(outcome, Outcome::Cancelled { .. }));
    }

    #[test]
    fn cycle_ids_increase() {
        let coordinator = CollectionCoordinator::new();
        let a = coordinator.reset();
        let b = coordinator.reset();
        assert!(b > a);
        assert_eq!(coordinator.current_cycle(), b);
    }

    #[test]
    fn unrepresentable_timeout_waits_for_publish() {
        let coordinator = Arc::new(CollectionCoordinator::new());
        let cycle = coordinator.reset();
        let publisher = {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                coordinator.publish(cycle, submitted("late"))
            })
        };

        let outcome = coordinator.acquire(Some(Duration::from_secs(u64::MAX)));
        assert_eq!(outcome, submitted("late"));
        assert!(publisher.join().unwrap());
    }
}
