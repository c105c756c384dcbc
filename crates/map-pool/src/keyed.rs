//! Keyed, concurrency-bounded resource pool.
//!
//! One bounded sub-pool per resource identity. Acquire grants an idle
//! resource, constructs a new one while under the per-identity bound, or
//! queues the caller FIFO until a release. Checked-out resources travel in
//! [`PoolGuard`]s that return them to the pool on drop, so a caller future
//! cancelled mid-request cannot strand a counted resource. Construction
//! failures are surfaced only to the caller that triggered them and never
//! poison the sub-pool. A drain stops new acquisitions, destroys idle
//! resources, and waits for outstanding checkouts before clearing the
//! registry.
//!
//! The registry is guarded by a single mutex that is never held across an
//! await point; factory calls run outside the lock. Waiters are woken
//! through oneshot channels carrying either a guarded resource or a permit
//! to construct one, so FIFO ordering is decided under the lock, and a
//! grant that ends up in an abandoned waiter's channel is recycled by the
//! guard's drop instead of being lost.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use metrics::counter;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::factory::ResourceFactory;

/// What a waiting acquirer is granted on wake-up.
enum Grant<F: ResourceFactory> {
    /// A released resource, already counted as checked out. Guarded, so a
    /// receiver dropped after the send still returns it to the pool.
    Ready(PoolGuard<F>),
    /// A construction slot; the waiter builds via the factory itself.
    Build,
}

struct Waiter<F: ResourceFactory> {
    id: u64,
    tx: oneshot::Sender<Grant<F>>,
}

struct Idle<R> {
    resource: R,
    since: Instant,
}

struct SubPool<F: ResourceFactory> {
    idle: Vec<Idle<F::Resource>>,
    checked_out: usize,
    waiters: VecDeque<Waiter<F>>,
}

impl<F: ResourceFactory> Default for SubPool<F> {
    fn default() -> Self {
        Self {
            idle: Vec::new(),
            checked_out: 0,
            waiters: VecDeque::new(),
        }
    }
}

struct Registry<F: ResourceFactory> {
    draining: bool,
    next_waiter_id: u64,
    subpools: HashMap<String, SubPool<F>>,
}

fn outstanding<F: ResourceFactory>(state: &Registry<F>) -> usize {
    state.subpools.values().map(|s| s.checked_out).sum()
}

/// Free a held construction slot: pass it to the next waiter, or drop the
/// checked-out count. Returns true when a drain waiter must be notified.
fn forfeit_slot<F: ResourceFactory>(state: &mut Registry<F>, identity: &str) -> bool {
    let draining = state.draining;
    let Some(sub) = state.subpools.get_mut(identity) else {
        return false;
    };
    if !draining {
        while let Some(waiter) = sub.waiters.pop_front() {
            if waiter.tx.send(Grant::Build).is_ok() {
                return false;
            }
        }
    }
    sub.checked_out = sub.checked_out.saturating_sub(1);
    draining && outstanding(state) == 0
}

enum Attempt<F: ResourceFactory> {
    Ready(F::Resource),
    Build,
    Wait(u64, oneshot::Receiver<Grant<F>>),
}

struct Shared<F: ResourceFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<Registry<F>>,
    drained: Notify,
}

/// Snapshot of one sub-pool's counters.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Resources idle in the sub-pool.
    pub idle: usize,
    /// Resources currently checked out.
    pub checked_out: usize,
    /// Acquires queued waiting for a resource.
    pub waiting: usize,
}

/// A checked-out resource.
///
/// Dereferences to the resource and returns it to the pool when dropped,
/// including when the owning future is cancelled mid-request.
pub struct PoolGuard<F: ResourceFactory> {
    resource: Option<F::Resource>,
    identity: String,
    pool: KeyedPool<F>,
}

impl<F: ResourceFactory> PoolGuard<F> {
    fn new(pool: &KeyedPool<F>, identity: &str, resource: F::Resource) -> Self {
        Self {
            resource: Some(resource),
            identity: identity.to_string(),
            pool: pool.clone(),
        }
    }

    /// The identity this resource was checked out under.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Empty the guard and take the raw resource; pool accounting for it
    /// becomes the caller's job.
    fn disarm(mut self) -> F::Resource {
        match self.resource.take() {
            Some(resource) => resource,
            // Filled at construction, emptied only here and in Drop.
            None => unreachable!("guard already emptied"),
        }
    }
}

impl<F: ResourceFactory> Deref for PoolGuard<F> {
    type Target = F::Resource;

    fn deref(&self) -> &F::Resource {
        match &self.resource {
            Some(resource) => resource,
            None => unreachable!("guard already emptied"),
        }
    }
}

impl<F: ResourceFactory> DerefMut for PoolGuard<F> {
    fn deref_mut(&mut self) -> &mut F::Resource {
        match &mut self.resource {
            Some(resource) => resource,
            None => unreachable!("guard already emptied"),
        }
    }
}

impl<F: ResourceFactory> fmt::Debug for PoolGuard<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolGuard")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<F: ResourceFactory> Drop for PoolGuard<F> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(err) = self.pool.release(&self.identity, resource) {
                warn!(identity = %self.identity, error = %err, "failed to return resource to pool");
            }
        }
    }
}

/// Holds a construction slot while the factory runs. If the building
/// future is dropped mid-construction, the slot goes back to the sub-pool
/// instead of leaking.
struct SlotReservation<F: ResourceFactory> {
    pool: KeyedPool<F>,
    identity: String,
    armed: bool,
}

impl<F: ResourceFactory> SlotReservation<F> {
    fn new(pool: &KeyedPool<F>, identity: &str) -> Self {
        Self {
            pool: pool.clone(),
            identity: identity.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<F: ResourceFactory> Drop for SlotReservation<F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let drained = {
            let mut state = self.pool.lock();
            forfeit_slot(&mut state, &self.identity)
        };
        if drained {
            self.pool.shared.drained.notify_waiters();
        }
    }
}

/// Keyed pool of expensive render resources.
///
/// Cheap to clone; clones share the same registry.
pub struct KeyedPool<F: ResourceFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ResourceFactory> Clone for KeyedPool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFactory> KeyedPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                config,
                state: Mutex::new(Registry {
                    draining: false,
                    next_waiter_id: 0,
                    subpools: HashMap::new(),
                }),
                drained: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<F>> {
        self.shared.state.lock().expect("pool registry mutex poisoned")
    }

    /// Acquire a resource for `identity` using the configured timeout.
    ///
    /// Suspends the caller until an idle resource is available, until a
    /// construction slot opens under the per-identity bound, or until the
    /// deadline elapses.
    pub async fn acquire(&self, identity: &str) -> Result<PoolGuard<F>, PoolError> {
        self.acquire_timeout(identity, self.shared.config.acquire_timeout)
            .await
    }

    /// Acquire with an explicit deadline; `None` waits forever.
    pub async fn acquire_timeout(
        &self,
        identity: &str,
        timeout: Option<Duration>,
    ) -> Result<PoolGuard<F>, PoolError> {
        let attempt = {
            let mut state = self.lock();
            if state.draining {
                return Err(PoolError::Draining);
            }
            let id = state.next_waiter_id;
            let max = self.shared.config.max_per_identity;
            let sub = state.subpools.entry(identity.to_string()).or_default();
            if let Some(idle) = sub.idle.pop() {
                sub.checked_out += 1;
                Attempt::Ready(idle.resource)
            } else if sub.checked_out < max {
                sub.checked_out += 1;
                Attempt::Build
            } else {
                let (tx, rx) = oneshot::channel();
                sub.waiters.push_back(Waiter { id, tx });
                state.next_waiter_id += 1;
                Attempt::Wait(id, rx)
            }
        };

        let guard = match attempt {
            // No await between leaving the lock and wrapping the resource,
            // so this hand-off cannot be interrupted by cancellation.
            Attempt::Ready(resource) => Ok(PoolGuard::new(self, identity, resource)),
            Attempt::Build => self.build(identity).await,
            Attempt::Wait(id, rx) => self.wait(identity, id, rx, timeout).await,
        }?;
        counter!("pool_acquired_total").increment(1);
        Ok(guard)
    }

    /// Return a checked-out resource.
    ///
    /// Called by [`PoolGuard`] on drop; also usable directly with a raw
    /// resource. Wakes the longest waiter for the identity, or parks the
    /// resource idle. After a drain the identity is unknown and the
    /// resource is destroyed instead of re-pooled. Releasing against a
    /// live sub-pool with zero checkouts signals a caller bug.
    pub fn release(&self, identity: &str, resource: F::Resource) -> Result<(), PoolError> {
        let mut to_destroy = None;
        let mut drained = false;
        let mut result = Ok(());
        {
            let mut state = self.lock();
            let draining = state.draining;
            match state.subpools.get_mut(identity) {
                None => {
                    debug!(identity, "release for an unknown sub-pool; destroying resource");
                    to_destroy = Some(resource);
                }
                Some(sub) if sub.checked_out == 0 => {
                    warn!(identity, "release of a resource this pool never checked out");
                    counter!("pool_protocol_violations_total").increment(1);
                    to_destroy = Some(resource);
                    result = Err(PoolError::ProtocolViolation);
                }
                Some(sub) => {
                    if draining {
                        sub.checked_out -= 1;
                        to_destroy = Some(resource);
                    } else {
                        self.requeue(identity, sub, resource);
                    }
                }
            }
            if draining {
                drained = outstanding(&state) == 0;
            }
        }
        if let Some(resource) = to_destroy {
            self.shared.factory.destroy(resource);
        }
        if drained {
            self.shared.drained.notify_waiters();
        }
        result
    }

    /// Hand a checked-out resource to the longest waiter, or park it idle.
    ///
    /// Runs under the registry lock. A grant bounced by a dead receiver is
    /// disarmed and retried; no guard is ever dropped while the lock is
    /// held, since its drop re-enters the lock.
    fn requeue(&self, identity: &str, sub: &mut SubPool<F>, resource: F::Resource) {
        let mut resource = resource;
        while let Some(waiter) = sub.waiters.pop_front() {
            match waiter.tx.send(Grant::Ready(PoolGuard::new(self, identity, resource))) {
                // Checked-out count transfers to the waiter unchanged.
                Ok(()) => return,
                // The waiter gave up; try the next one.
                Err(Grant::Ready(guard)) => resource = guard.disarm(),
                Err(Grant::Build) => unreachable!("requeue sends Ready grants"),
            }
        }
        sub.checked_out -= 1;
        sub.idle.push(Idle {
            resource,
            since: Instant::now(),
        });
    }

    /// Stop accepting acquires, destroy idle resources, wait for all
    /// checkouts to be released, then clear the registry. Idempotent.
    pub async fn drain(&self) {
        let doomed: Vec<F::Resource> = {
            let mut state = self.lock();
            state.draining = true;
            let mut doomed = Vec::new();
            for sub in state.subpools.values_mut() {
                // Dropping the senders fails every queued acquire fast.
                sub.waiters.clear();
                doomed.extend(sub.idle.drain(..).map(|idle| idle.resource));
            }
            doomed
        };
        let destroyed = doomed.len();
        for resource in doomed {
            self.shared.factory.destroy(resource);
        }

        loop {
            let notified = self.shared.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if outstanding(&self.lock()) == 0 {
                break;
            }
            notified.await;
        }

        self.lock().subpools.clear();
        debug!(destroyed, "pool drained");
    }

    /// Whether a drain has started.
    pub fn is_draining(&self) -> bool {
        self.lock().draining
    }

    /// Destroy idle resources older than the configured idle timeout,
    /// keeping at least `min_idle` warm per identity.
    ///
    /// Called periodically by [`spawn_idle_sweeper`](Self::spawn_idle_sweeper);
    /// exposed for direct use in tests.
    pub fn sweep_idle(&self) {
        let now = Instant::now();
        let evicted: Vec<F::Resource> = {
            let mut state = self.lock();
            if state.draining {
                return;
            }
            let idle_timeout = self.shared.config.idle_timeout;
            let min_idle = self.shared.config.min_idle;
            let mut evicted = Vec::new();
            for sub in state.subpools.values_mut() {
                // Idle entries are LIFO-reused, so the stalest sit at the front.
                while sub.idle.len() > min_idle {
                    match sub.idle.first() {
                        Some(entry) if now.duration_since(entry.since) >= idle_timeout => {
                            evicted.push(sub.idle.remove(0).resource);
                        }
                        _ => break,
                    }
                }
            }
            evicted
        };
        if !evicted.is_empty() {
            counter!("pool_idle_evicted_total").increment(evicted.len() as u64);
            debug!(evicted = evicted.len(), "evicted idle resources");
        }
        for resource in evicted {
            self.shared.factory.destroy(resource);
        }
    }

    /// Spawn the periodic idle-eviction task.
    pub fn spawn_idle_sweeper(&self) -> JoinHandle<()> {
        let pool = self.clone();
        let period = self.shared.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                pool.sweep_idle();
            }
        })
    }

    /// Pre-construct up to `count` idle resources for `identity`, capped
    /// by the per-identity bound.
    pub async fn warm(&self, identity: &str, count: usize) -> Result<(), PoolError> {
        let target = count.min(self.shared.config.max_per_identity);
        loop {
            {
                let mut state = self.lock();
                if state.draining {
                    return Err(PoolError::Draining);
                }
                let sub = state.subpools.entry(identity.to_string()).or_default();
                if sub.idle.len() + sub.checked_out >= target {
                    return Ok(());
                }
                // Hold a construction slot while building.
                sub.checked_out += 1;
            }
            let mut reservation = SlotReservation::new(self, identity);
            let resource = match self.shared.factory.create(identity).await {
                Ok(resource) => {
                    reservation.disarm();
                    resource
                }
                // The armed reservation gives the slot back.
                Err(err) => return Err(PoolError::FactoryFailed(err.to_string())),
            };
            counter!("pool_created_total").increment(1);
            // Returning the fresh resource parks it idle (or feeds a waiter).
            self.release(identity, resource)?;
        }
    }

    /// Snapshot the counters for one identity, if a sub-pool exists.
    pub fn status(&self, identity: &str) -> Option<PoolStatus> {
        let state = self.lock();
        state.subpools.get(identity).map(|sub| PoolStatus {
            idle: sub.idle.len(),
            checked_out: sub.checked_out,
            waiting: sub.waiters.len(),
        })
    }

    async fn build(&self, identity: &str) -> Result<PoolGuard<F>, PoolError> {
        let mut reservation = SlotReservation::new(self, identity);
        match self.shared.factory.create(identity).await {
            Ok(resource) => {
                reservation.disarm();
                counter!("pool_created_total").increment(1);
                debug!(identity, "constructed pooled resource");
                Ok(PoolGuard::new(self, identity, resource))
            }
            Err(err) => {
                counter!("pool_factory_failures_total").increment(1);
                warn!(identity, error = %err, "resource construction failed");
                // The armed reservation hands the slot to the next waiter.
                Err(PoolError::FactoryFailed(err.to_string()))
            }
        }
    }

    async fn wait(
        &self,
        identity: &str,
        id: u64,
        mut rx: oneshot::Receiver<Grant<F>>,
        timeout: Option<Duration>,
    ) -> Result<PoolGuard<F>, PoolError> {
        let granted = match timeout {
            None => rx.await,
            Some(deadline) => match tokio::time::timeout(deadline, &mut rx).await {
                Ok(granted) => granted,
                Err(_) => return self.cancel_wait(identity, id, rx),
            },
        };
        match granted {
            Ok(Grant::Ready(guard)) => Ok(guard),
            Ok(Grant::Build) => self.build(identity).await,
            // The sender is dropped only when the pool begins draining.
            Err(_) => Err(PoolError::Draining),
        }
    }

    /// Withdraw a timed-out waiter without leaking its queue entry. If a
    /// grant raced the deadline, route it to the next waiter instead of
    /// discarding it.
    fn cancel_wait(
        &self,
        identity: &str,
        id: u64,
        mut rx: oneshot::Receiver<Grant<F>>,
    ) -> Result<PoolGuard<F>, PoolError> {
        counter!("pool_acquire_timeouts_total").increment(1);
        let mut to_destroy = None;
        let mut drained = false;
        {
            let mut state = self.lock();
            if let Some(sub) = state.subpools.get_mut(identity) {
                if let Some(pos) = sub.waiters.iter().position(|w| w.id == id) {
                    sub.waiters.remove(pos);
                    return Err(PoolError::Timeout);
                }
            }
            match rx.try_recv() {
                Ok(Grant::Ready(guard)) => {
                    // Disarmed under the lock; a guard drop here would
                    // re-enter the mutex.
                    let resource = guard.disarm();
                    if state.draining {
                        if let Some(sub) = state.subpools.get_mut(identity) {
                            sub.checked_out = sub.checked_out.saturating_sub(1);
                        }
                        to_destroy = Some(resource);
                        drained = outstanding(&state) == 0;
                    } else if let Some(sub) = state.subpools.get_mut(identity) {
                        self.requeue(identity, sub, resource);
                    } else {
                        to_destroy = Some(resource);
                    }
                }
                Ok(Grant::Build) => {
                    drained = forfeit_slot(&mut state, identity);
                }
                Err(_) => {}
            }
        }
        if let Some(resource) = to_destroy {
            self.shared.factory.destroy(resource);
        }
        if drained {
            self.shared.drained.notify_waiters();
        }
        Err(PoolError::Timeout)
    }
}
