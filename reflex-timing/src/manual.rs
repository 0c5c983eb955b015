//! Simulated clock and scheduler
//!
//! Time only moves when [`ManualScheduler::advance`] (or
//! [`ManualClock::advance`]) is called, which makes trial timing fully
//! deterministic in tests and benchmarks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::Clock;
use crate::scheduler::{Scheduler, TriggerToken};

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ns: u64) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(ns)),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Pending {
    id: u64,
    deadline_ns: u64,
    delay: Duration,
    token: TriggerToken,
}

#[derive(Debug, Default)]
struct Queue {
    next_id: u64,
    pending: Vec<Pending>,
    scheduled_total: usize,
}

/// Scheduler driven by a [`ManualClock`]
///
/// Clones share the same queue, so a test can keep one handle while the
/// state machine owns another.
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    queue: Arc<Mutex<Queue>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            queue: Arc::new(Mutex::new(Queue::default())),
        }
    }

    fn queue(&self) -> MutexGuard<'_, Queue> {
        // A panicked test thread cannot leave the queue half-updated.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Triggers scheduled and not yet fired or cancelled.
    pub fn pending_count(&self) -> usize {
        self.queue().pending.len()
    }

    /// Triggers ever scheduled through this queue.
    pub fn scheduled_total(&self) -> usize {
        self.queue().scheduled_total
    }

    /// Delay of the earliest pending trigger.
    pub fn next_delay(&self) -> Option<Duration> {
        self.queue()
            .pending
            .iter()
            .min_by_key(|p| p.deadline_ns)
            .map(|p| p.delay)
    }

    /// Moves the clock forward and returns the tokens that became due,
    /// earliest first.
    pub fn advance(&self, d: Duration) -> Vec<TriggerToken> {
        self.clock.advance(d);
        let now = self.clock.now();

        let mut queue = self.queue();
        let (mut due, rest): (Vec<_>, Vec<_>) =
            queue.pending.drain(..).partition(|p| p.deadline_ns <= now);
        queue.pending = rest;
        due.sort_by_key(|p| p.deadline_ns);
        due.into_iter().map(|p| p.token).collect()
    }

    pub fn advance_ms(&self, ms: u64) -> Vec<TriggerToken> {
        self.advance(Duration::from_millis(ms))
    }
}

impl Scheduler for ManualScheduler {
    type Handle = u64;

    fn after(&mut self, delay: Duration, token: TriggerToken) -> u64 {
        let deadline_ns = self.clock.now() + delay.as_nanos() as u64;
        let mut queue = self.queue();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.scheduled_total += 1;
        queue.pending.push(Pending {
            id,
            deadline_ns,
            delay,
            token,
        });
        id
    }

    fn cancel(&mut self, handle: u64) {
        self.queue().pending.retain(|p| p.id != handle);
    }
}
