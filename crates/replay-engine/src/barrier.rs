//! Rendezvous barriers between the replay driver and its consumers.
//!
//! There is one barrier per (symbol, data kind). For every data point the
//! driver appends the point to the barrier's buffer, initiates a cycle and
//! waits until every subscriber registered at initiation has completed its
//! delivery. A barrier with no subscribers never blocks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use replay_core::error::BarrierError;
use replay_core::types::{DataKind, MarketEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// How the driver treats subscribers that do not complete a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierPolicy {
    /// Wait as long as it takes
    #[default]
    Strict,
    /// Evict subscribers still busy after `after` and advance
    Timeout { after: Duration },
}

/// Identifies a barrier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarrierKey {
    pub symbol: String,
    pub kind: DataKind,
}

impl BarrierKey {
    pub fn new(symbol: impl Into<String>, kind: DataKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
        }
    }
}

impl fmt::Display for BarrierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.kind)
    }
}

/// Result of one publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleOutcome {
    /// Subscribers that completed (or left) before the driver advanced
    pub delivered: usize,
    /// Subscribers evicted by the timeout policy
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct BarrierState {
    buffer: Vec<MarketEvent>,
    /// Present while a cycle is in flight
    snapshot: Option<Arc<[MarketEvent]>>,
    generation: u64,
    next_slot: u64,
    /// Slot -> last generation handed to that slot
    subscribers: BTreeMap<u64, u64>,
    /// Slots that still owe a completion for the current generation
    awaiting: BTreeSet<u64>,
    evicted: BTreeSet<u64>,
    closed: bool,
}

enum Readiness {
    Ready(Delivery),
    Closed,
    Waiting,
}

/// Barrier for one (symbol, kind) stream.
#[derive(Debug)]
pub struct ReplayBarrier {
    key: BarrierKey,
    policy: BarrierPolicy,
    state: Mutex<BarrierState>,
    initiated: Notify,
    completed: Notify,
}

impl ReplayBarrier {
    /// Create an idle barrier.
    pub fn new(key: BarrierKey, policy: BarrierPolicy) -> Self {
        Self {
            key,
            policy,
            state: Mutex::new(BarrierState::default()),
            initiated: Notify::new(),
            completed: Notify::new(),
        }
    }

    /// Barrier key.
    pub fn key(&self) -> &BarrierKey {
        &self.key
    }

    /// Stall policy.
    pub fn policy(&self) -> BarrierPolicy {
        self.policy
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Number of cycles initiated so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Check if the barrier was closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Register a subscriber.
    ///
    /// A subscriber joining while a cycle is in flight first receives the
    /// next cycle.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, BarrierError> {
        let mut state = self.lock();
        if state.closed {
            return Err(self.closed_error());
        }
        let slot = state.next_slot;
        state.next_slot += 1;
        let generation = state.generation;
        state.subscribers.insert(slot, generation);
        debug!(barrier = %self.key, slot, "Subscriber joined");

        Ok(Subscription {
            barrier: Arc::clone(self),
            slot,
        })
    }

    /// Deliver one data point to every subscriber and wait for them.
    pub async fn publish(&self, event: MarketEvent) -> Result<CycleOutcome, BarrierError> {
        let expected = {
            let mut state = self.lock();
            if state.closed {
                return Err(self.closed_error());
            }
            state.buffer.push(event);
            if state.subscribers.is_empty() {
                state.buffer.clear();
                return Ok(CycleOutcome::default());
            }

            let snapshot: Arc<[MarketEvent]> = std::mem::take(&mut state.buffer).into();
            state.snapshot = Some(snapshot);
            state.generation += 1;
            state.awaiting = state.subscribers.keys().copied().collect();
            state.awaiting.len()
        };
        trace!(barrier = %self.key, subscribers = expected, "Cycle initiated");
        self.initiated.notify_waiters();

        let evicted = match self.policy {
            BarrierPolicy::Strict => {
                self.wait_completed().await;
                0
            }
            BarrierPolicy::Timeout { after } => {
                match tokio::time::timeout(after, self.wait_completed()).await {
                    Ok(()) => 0,
                    Err(_) => self.evict_stragglers(),
                }
            }
        };

        let mut state = self.lock();
        state.snapshot = None;
        state.awaiting.clear();

        Ok(CycleOutcome {
            delivered: expected - evicted,
            evicted,
        })
    }

    /// Close the barrier. Every pending and future `recv` returns `None`
    /// and a driver blocked in `publish` is released.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.awaiting.clear();
        state.buffer.clear();
        drop(state);

        debug!(barrier = %self.key, "Barrier closed");
        self.initiated.notify_waiters();
        self.completed.notify_waiters();
    }

    async fn wait_completed(&self) {
        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let done = self.lock().awaiting.is_empty();
            if done {
                return;
            }
            notified.await;
        }
    }

    fn evict_stragglers(&self) -> usize {
        let mut state = self.lock();
        let stragglers = std::mem::take(&mut state.awaiting);
        for slot in &stragglers {
            state.subscribers.remove(slot);
            state.evicted.insert(*slot);
            warn!(
                barrier = %self.key,
                slot,
                generation = state.generation,
                "Evicting subscriber that did not complete in time"
            );
        }
        drop(state);

        self.initiated.notify_waiters();
        stragglers.len()
    }

    fn readiness(self: &Arc<Self>, slot: u64) -> Readiness {
        let mut state = self.lock();
        if state.closed || state.evicted.contains(&slot) {
            return Readiness::Closed;
        }
        if !state.awaiting.contains(&slot) {
            return Readiness::Waiting;
        }
        let Some(events) = state.snapshot.clone() else {
            return Readiness::Waiting;
        };

        let generation = state.generation;
        match state.subscribers.get_mut(&slot) {
            Some(seen) if *seen < generation => {
                *seen = generation;
                Readiness::Ready(Delivery {
                    barrier: Arc::clone(self),
                    slot,
                    generation,
                    events,
                })
            }
            Some(_) => Readiness::Waiting,
            None => Readiness::Closed,
        }
    }

    fn complete(&self, slot: u64, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || !state.awaiting.remove(&slot) {
            return;
        }
        let done = state.awaiting.is_empty();
        drop(state);

        trace!(barrier = %self.key, slot, generation, "Delivery completed");
        if done {
            self.completed.notify_waiters();
        }
    }

    fn unsubscribe(&self, slot: u64) {
        let mut state = self.lock();
        state.subscribers.remove(&slot);
        state.evicted.remove(&slot);
        let released = state.awaiting.remove(&slot);
        let done = released && state.awaiting.is_empty();
        drop(state);

        debug!(barrier = %self.key, slot, "Subscriber left");
        if done {
            self.completed.notify_waiters();
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed_error(&self) -> BarrierError {
        BarrierError::Closed {
            symbol: self.key.symbol.clone(),
            kind: self.key.kind.to_string(),
        }
    }
}

/// A consumer's registration on a barrier. Dropping it unsubscribes; an
/// in-flight cycle then no longer waits for this subscriber.
#[derive(Debug)]
pub struct Subscription {
    barrier: Arc<ReplayBarrier>,
    slot: u64,
}

impl Subscription {
    /// Key of the subscribed barrier.
    pub fn key(&self) -> &BarrierKey {
        self.barrier.key()
    }

    /// Wait for the next cycle.
    ///
    /// Returns `None` once the barrier is closed or this subscriber was
    /// evicted. Dropping the returned future before it resolves loses
    /// nothing.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            let notified = self.barrier.initiated.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.barrier.readiness(self.slot) {
                Readiness::Ready(delivery) => return Some(delivery),
                Readiness::Closed => return None,
                Readiness::Waiting => notified.await,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.barrier.unsubscribe(self.slot);
    }
}

/// One cycle's data, handed to one subscriber.
///
/// Completion is signalled exactly once, when the delivery is dropped or
/// [`complete`](Delivery::complete)d.
#[derive(Debug)]
#[must_use = "dropping a delivery completes it immediately"]
pub struct Delivery {
    barrier: Arc<ReplayBarrier>,
    slot: u64,
    generation: u64,
    events: Arc<[MarketEvent]>,
}

impl Delivery {
    /// Data points of this cycle.
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Shared handle to the data points of this cycle.
    pub fn snapshot(&self) -> Arc<[MarketEvent]> {
        Arc::clone(&self.events)
    }

    /// Cycle number.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Key of the barrier that delivered this cycle.
    pub fn key(&self) -> &BarrierKey {
        self.barrier.key()
    }

    /// Signal completion.
    pub fn complete(self) {}
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.barrier.complete(self.slot, self.generation);
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    barriers: BTreeMap<BarrierKey, Arc<ReplayBarrier>>,
    closed: bool,
}

/// Barriers of one replay run, keyed by (symbol, kind).
#[derive(Debug, Default)]
pub struct BarrierRegistry {
    policy: BarrierPolicy,
    state: Mutex<RegistryState>,
}

impl BarrierRegistry {
    /// Create a registry whose barriers use `policy`.
    pub fn new(policy: BarrierPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Stall policy of every barrier.
    pub fn policy(&self) -> BarrierPolicy {
        self.policy
    }

    /// Get or create the barrier for a stream. Barriers created after
    /// [`close_all`](Self::close_all) start closed.
    pub fn barrier(&self, symbol: &str, kind: DataKind) -> Arc<ReplayBarrier> {
        let mut state = self.lock();
        let closed = state.closed;
        let policy = self.policy;
        let barrier = state
            .barriers
            .entry(BarrierKey::new(symbol, kind))
            .or_insert_with_key(|key| {
                let barrier = ReplayBarrier::new(key.clone(), policy);
                if closed {
                    barrier.close();
                }
                Arc::new(barrier)
            });
        Arc::clone(barrier)
    }

    /// Subscribe to a stream.
    pub fn subscribe(&self, symbol: &str, kind: DataKind) -> Result<Subscription, BarrierError> {
        self.barrier(symbol, kind).subscribe()
    }

    /// Keys of every barrier created so far.
    pub fn keys(&self) -> Vec<BarrierKey> {
        self.lock().barriers.keys().cloned().collect()
    }

    /// Close every barrier, releasing all waiting subscribers.
    pub fn close_all(&self) {
        let barriers: Vec<Arc<ReplayBarrier>> = {
            let mut state = self.lock();
            state.closed = true;
            state.barriers.values().cloned().collect()
        };
        for barrier in barriers {
            barrier.close();
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::types::Tick;
    use rust_decimal_macros::dec;

    fn barrier(policy: BarrierPolicy) -> Arc<ReplayBarrier> {
        Arc::new(ReplayBarrier::new(
            BarrierKey::new("XBTUSD", DataKind::Tick),
            policy,
        ))
    }

    fn tick(ts: i64) -> MarketEvent {
        Tick::new("XBTUSD", ts, dec!(100), dec!(1)).into()
    }

    fn spawn_publish(
        barrier: &Arc<ReplayBarrier>,
        ts: i64,
    ) -> tokio::task::JoinHandle<Result<CycleOutcome, BarrierError>> {
        let barrier = Arc::clone(barrier);
        tokio::spawn(async move { barrier.publish(tick(ts)).await })
    }

    #[tokio::test]
    async fn test_no_subscribers_never_blocks() {
        let barrier = barrier(BarrierPolicy::Strict);
        for ts in 0..10 {
            let outcome = barrier.publish(tick(ts)).await.unwrap();
            assert_eq!(outcome, CycleOutcome::default());
        }
        assert_eq!(barrier.generation(), 0);
    }

    #[tokio::test]
    async fn test_waits_for_every_subscriber() {
        let barrier = barrier(BarrierPolicy::Strict);
        let mut first = barrier.subscribe().unwrap();
        let mut second = barrier.subscribe().unwrap();

        let publisher = spawn_publish(&barrier, 1);
        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.events(), b.events());
        assert_eq!(a.events(), &[tick(1)]);

        a.complete();
        tokio::task::yield_now().await;
        assert!(!publisher.is_finished());

        b.complete();
        let outcome = publisher.await.unwrap().unwrap();
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.evicted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_waits_for_next_cycle() {
        let barrier = barrier(BarrierPolicy::Strict);
        let mut early = barrier.subscribe().unwrap();

        let publisher = spawn_publish(&barrier, 1);
        let delivery = early.recv().await.unwrap();

        let mut late = barrier.subscribe().unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(10), late.recv()).await;
        assert!(pending.is_err());

        delivery.complete();
        assert_eq!(publisher.await.unwrap().unwrap().delivered, 1);

        let publisher = spawn_publish(&barrier, 2);
        let a = early.recv().await.unwrap();
        let b = late.recv().await.unwrap();
        assert_eq!(b.events(), &[tick(2)]);
        assert_eq!(a.generation(), b.generation());
        drop((a, b));
        assert_eq!(publisher.await.unwrap().unwrap().delivered, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_mid_cycle_counts_as_completion() {
        let barrier = barrier(BarrierPolicy::Strict);
        let mut stays = barrier.subscribe().unwrap();
        let leaves = barrier.subscribe().unwrap();

        let publisher = spawn_publish(&barrier, 1);
        let delivery = stays.recv().await.unwrap();
        delivery.complete();
        tokio::task::yield_now().await;
        assert!(!publisher.is_finished());

        drop(leaves);

        assert_eq!(publisher.await.unwrap().unwrap().delivered, 2);
        assert_eq!(barrier.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_one_wake_delivers_once() {
        let barrier = barrier(BarrierPolicy::Strict);
        let mut sub = barrier.subscribe().unwrap();
        let mut other = barrier.subscribe().unwrap();

        let publisher = spawn_publish(&barrier, 1);
        let first = sub.recv().await.unwrap();
        first.complete();

        // The cycle is still in flight for `other`; `sub` must not see it twice.
        let again = tokio::time::timeout(Duration::from_millis(20), sub.recv()).await;
        assert!(again.is_err());

        other.recv().await.unwrap().complete();
        publisher.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_policy_evicts_stalled_subscriber() {
        let barrier = barrier(BarrierPolicy::Timeout {
            after: Duration::from_millis(100),
        });
        let mut slow = barrier.subscribe().unwrap();

        let publisher = spawn_publish(&barrier, 1);
        let held = slow.recv().await.unwrap();
        let outcome = publisher.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            CycleOutcome {
                delivered: 0,
                evicted: 1
            }
        );

        drop(held);
        assert!(slow.recv().await.is_none());
        assert_eq!(barrier.subscriber_count(), 0);

        // With the stalled subscriber gone the barrier no longer blocks.
        assert_eq!(barrier.publish(tick(2)).await.unwrap(), CycleOutcome::default());
    }

    #[tokio::test]
    async fn test_close_releases_waiting_subscribers() {
        let barrier = barrier(BarrierPolicy::Strict);
        let mut sub = barrier.subscribe().unwrap();

        let waiter = tokio::spawn(async move { sub.recv().await.is_none() });
        tokio::task::yield_now().await;
        barrier.close();

        assert!(waiter.await.unwrap());
        assert!(barrier.subscribe().is_err());
        assert!(matches!(
            barrier.publish(tick(1)).await,
            Err(BarrierError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_releases_blocked_driver() {
        let barrier = barrier(BarrierPolicy::Strict);
        let mut sub = barrier.subscribe().unwrap();

        let publisher = spawn_publish(&barrier, 1);
        let held = sub.recv().await.unwrap();
        barrier.close();

        assert!(publisher.await.unwrap().is_ok());
        drop(held);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_registry_reuses_barriers() {
        let registry = BarrierRegistry::new(BarrierPolicy::Strict);
        let a = registry.barrier("XBTUSD", DataKind::Bar);
        let b = registry.barrier("XBTUSD", DataKind::Bar);
        let c = registry.barrier("XBTUSD", DataKind::Tick);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));

        let _sub = registry.subscribe("XBTUSD", DataKind::Bar).unwrap();
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(registry.keys().len(), 2);

        registry.close_all();
        assert!(a.is_closed());
        assert!(registry.subscribe("ETHUSD", DataKind::Bar).is_err());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(BarrierKey::new("XBTUSD", DataKind::Tick).to_string(), "XBTUSD/tick");
    }
}
