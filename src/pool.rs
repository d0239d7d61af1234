// Copyright 2025 Leasepool Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::errors::PoolError;
use crate::evict;
use crate::evict::Evictor;
use crate::lease::Lease;
use crate::manage::Manage;
use crate::manage::ObjectState;
use crate::queue::IdleQueue;
use crate::queue::Item;
use crate::queue::QueueStrategy;
use crate::retention::MemoryPressure;
use crate::retention::ReclaimSet;
use crate::retention::Retention;
use crate::retention::Slot;

/// The configuration of [`Pool`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Hard ceiling on the number of live objects (idle plus leased).
    pub capacity: usize,

    /// How strongly idle objects are retained under memory pressure.
    pub retention: Retention,

    /// How long an object may sit idle before it is evicted and disposed.
    ///
    /// `None` disables idle eviction and the pool runs no background thread.
    pub max_idle_time: Option<Duration>,

    /// Queue strategy of the [`Pool`].
    ///
    /// Determines the order of objects being queued and dequeued.
    pub queue_strategy: QueueStrategy,
}

impl PoolConfig {
    /// Creates a new [`PoolConfig`].
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            retention: Retention::default(),
            max_idle_time: None,
            queue_strategy: QueueStrategy::default(),
        }
    }

    /// Returns a new [`PoolConfig`] with the specified retention mode.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified max idle time.
    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = Some(max_idle_time);
        self
    }

    /// Returns a new [`PoolConfig`] with the specified queue strategy.
    pub fn with_queue_strategy(mut self, queue_strategy: QueueStrategy) -> Self {
        self.queue_strategy = queue_strategy;
        self
    }
}

/// The current pool status.
///
/// See [`Pool::status`].
///
/// With [`Retention::Soft`] or [`Retention::Weak`], `live` and `idle` count
/// shed slots until the next acquisition reconciles them; the numbers are
/// meant for an overall insight, not for exact accounting.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolStatus {
    /// The configured capacity of the pool.
    pub capacity: usize,

    /// The number of objects currently in existence, idle plus leased.
    pub live: usize,

    /// The number of idle objects waiting in the pool.
    pub idle: usize,

    /// The number of objects currently leased out.
    pub leased: usize,
}

/// Admission control for object creation.
///
/// `try_reserve` optimistically increments and compensates on overshoot, so
/// the count may transiently read `capacity + k` with `k` callers inside the
/// window; at any quiescent point it is at most `capacity`.
struct LiveCounter {
    current: AtomicUsize,
    capacity: usize,
}

impl LiveCounter {
    fn new(capacity: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            capacity,
        }
    }

    fn try_reserve(&self) -> bool {
        if self.current.fetch_add(1, Ordering::SeqCst) < self.capacity {
            true
        } else {
            self.current.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    fn release_one(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Generic thread-safe object pool with a maximum size.
///
/// See the [crate level documentation](crate) for more.
pub struct Pool<M: Manage> {
    config: PoolConfig,
    manager: M,

    /// Counts objects in existence; admission control for lazy creation.
    live: LiveCounter,
    /// Idle objects, bounded by the capacity.
    queue: IdleQueue<M::Object>,
    closed: AtomicBool,
    /// Source of per-insertion item ids for eviction identity.
    next_id: AtomicU64,
    reclaim: ReclaimSet<M::Object>,
    evictor: Option<Evictor>,
}

impl<M: Manage> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("live", &self.live.current())
            .field("idle", &self.queue.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<M: Manage> Pool<M> {
    /// Creates a new [`Pool`].
    ///
    /// A finite [`max_idle_time`](PoolConfig::max_idle_time) spawns the
    /// pool's eviction thread; otherwise the pool runs no threads of its
    /// own.
    ///
    /// # Panics
    ///
    /// Panics if the configured capacity is zero.
    pub fn new(config: PoolConfig, manager: M) -> Arc<Self> {
        assert!(config.capacity > 0, "pool capacity must be non-zero");

        let evictor = config.max_idle_time.map(|_| Evictor::new());
        let pool = Arc::new(Self {
            live: LiveCounter::new(config.capacity),
            queue: IdleQueue::new(config.capacity, config.queue_strategy),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            reclaim: ReclaimSet::new(),
            evictor,
            config,
            manager,
        });

        if let Some(evictor) = &pool.evictor {
            let shared = evictor.shared();
            let weak = Arc::downgrade(&pool);
            let _detached = std::thread::Builder::new()
                .name("leasepool-evict".to_owned())
                .spawn(move || evict::run(shared, weak))
                .expect("failed to spawn eviction thread");
        }

        pool
    }

    /// Retrieves a [`Lease`] from this [`Pool`], blocking until an object is
    /// available.
    ///
    /// The pool first tries the idle queue, then creates a new object if
    /// fewer than `capacity` exist, and only then parks the calling thread
    /// until another lease is released. Blocked callers are woken by
    /// [`close`](Pool::close) and fail with [`PoolError::Closed`].
    ///
    /// This method should be called with a pool wrapped in an [`Arc`].
    pub fn get(self: &Arc<Self>) -> Result<Lease<M>, PoolError<M::Error>> {
        loop {
            if let Some(lease) = self.try_admit()? {
                return Ok(lease);
            }
            match self.queue.take() {
                None => return Err(PoolError::Closed),
                Some(item) => {
                    if let Some(state) = self.redeem(item) {
                        return Ok(self.lease_out(state));
                    }
                    // The failed redemption freed a live slot; go around and
                    // admit through creation rather than parking again.
                }
            }
        }
    }

    /// As [`get`](Pool::get), but returns `Ok(None)` instead of blocking
    /// when the pool is at capacity with nothing idle.
    pub fn try_get(self: &Arc<Self>) -> Result<Option<Lease<M>>, PoolError<M::Error>> {
        self.try_admit()
    }

    /// As [`get`](Pool::get), but waits at most `timeout` for an object and
    /// returns `Ok(None)` on expiry.
    ///
    /// The bound applies to the wait only, not to the non-blocking preamble.
    /// An object that turns out to be shed or invalid after the wait
    /// consumes the budget: the call destroys it and returns `Ok(None)`
    /// rather than waiting again.
    pub fn get_timeout(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> Result<Option<Lease<M>>, PoolError<M::Error>> {
        if let Some(lease) = self.try_admit()? {
            return Ok(Some(lease));
        }
        match self.queue.poll_within(timeout) {
            Some(item) => Ok(self.redeem(item).map(|state| self.lease_out(state))),
            None => {
                if self.closed.load(Ordering::Acquire) {
                    Err(PoolError::Closed)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Creates objects until the pool holds `capacity` live objects.
    ///
    /// Each new object is recycled and queued idle. After a successful fill
    /// the pool will not invoke [`Manage::create`] again until an object
    /// leaves it.
    pub fn fill(&self) -> Result<(), PoolError<M::Error>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        while self.live.try_reserve() {
            let mut o = self.create_object()?;
            if let Err(e) = self.manager.recycle(&mut o) {
                self.destroy_value(o);
                return Err(PoolError::Manager(e));
            }
            self.insert_idle(ObjectState::new(o));
        }
        Ok(())
    }

    /// Destroys every idle object. Leased objects are unaffected.
    pub fn drain(&self) -> Result<(), PoolError<M::Error>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        self.drain_idle();
        Ok(())
    }

    /// Closes the pool: drains the idle set, wakes blocked getters, and
    /// stops the eviction thread.
    ///
    /// Subsequent acquisitions fail with [`PoolError::Closed`]; leases still
    /// outstanding dispose their object on release instead of re-queuing it.
    /// Calling `close` again is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("closing pool");
        self.queue.shutdown();
        self.drain_idle();
        if let Some(evictor) = &self.evictor {
            evictor.shutdown();
        }
    }

    /// Releases idle objects held under [`Retention::Soft`] or
    /// [`Retention::Weak`], returning how many were shed.
    ///
    /// This is the hook to wire to an application's low-memory signal. Shed
    /// values are dropped without passing through [`Manage::dispose`]; the
    /// pool compensates its accounting the next time the emptied slots are
    /// extracted.
    pub fn shed_idle(&self, pressure: MemoryPressure) -> usize {
        let shed = self.reclaim.shed(self.config.retention, pressure);
        if shed > 0 {
            tracing::debug!(count = shed, "shed idle objects under memory pressure");
        }
        shed
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Returns the number of idle objects waiting in the pool.
    pub fn idle_count(&self) -> usize {
        self.queue.len()
    }

    /// Returns the number of objects in existence, idle plus leased.
    pub fn live(&self) -> usize {
        self.live.current()
    }

    /// Returns the number of objects currently leased out.
    pub fn leased(&self) -> usize {
        self.live.current().saturating_sub(self.queue.len())
    }

    /// Returns the current status of the pool.
    ///
    /// The numbers are a best-effort snapshot and will be off while other
    /// threads are mid-operation; they are meant for an overall insight.
    pub fn status(&self) -> PoolStatus {
        let live = self.live.current();
        let idle = self.queue.len();
        PoolStatus {
            capacity: self.config.capacity,
            live,
            idle,
            leased: live.saturating_sub(idle),
        }
    }

    /// The non-blocking admission sequence: closed check, idle queue, then
    /// creation under the capacity ceiling.
    fn try_admit(self: &Arc<Self>) -> Result<Option<Lease<M>>, PoolError<M::Error>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        while let Some(item) = self.queue.poll() {
            if let Some(state) = self.redeem(item) {
                return Ok(Some(self.lease_out(state)));
            }
        }
        if self.live.try_reserve() {
            let o = self.create_object()?;
            tracing::trace!("created new pooled object");
            return Ok(Some(self.lease_out(ObjectState::new(o))));
        }
        Ok(None)
    }

    /// Creates through the manager with the live reservation already taken;
    /// the reservation is rolled back if creation fails or panics.
    fn create_object(&self) -> Result<M::Object, PoolError<M::Error>> {
        let guard = scopeguard::guard((), |()| self.live.release_one());
        let o = self.manager.create().map_err(PoolError::Manager)?;
        scopeguard::ScopeGuard::into_inner(guard);
        Ok(o)
    }

    /// Turns a dequeued item into a usable object, or destroys it and
    /// returns `None` when its slot was shed or the object fails validation.
    fn redeem(&self, mut item: Item<M::Object>) -> Option<ObjectState<M::Object>> {
        let id = item.id();
        if let Some(evictor) = &self.evictor {
            evictor.cancel(id);
        }
        match item.take_value() {
            None => {
                // Shed while idle: the husk only compensates the live count.
                self.live.release_one();
                None
            }
            Some(mut o) => {
                let mut status = item.status();
                if self.manager.is_valid(&mut o, &status) {
                    status.recycle_count += 1;
                    status.recycled = Some(Instant::now());
                    Some(ObjectState { o, status })
                } else {
                    tracing::debug!(item = id, "destroying idle object that failed validation");
                    self.manager.dispose(o);
                    self.live.release_one();
                    None
                }
            }
        }
    }

    fn lease_out(self: &Arc<Self>, state: ObjectState<M::Object>) -> Lease<M> {
        Lease::new(state, Arc::downgrade(self))
    }

    /// Returns a leased object to the idle set, or disposes it when the
    /// pool is closed, recycling fails, or the queue insertion is lost to a
    /// race.
    pub(crate) fn give_back(&self, mut state: ObjectState<M::Object>) -> Result<(), M::Error> {
        if self.closed.load(Ordering::Acquire) {
            self.destroy_value(state.o);
            return Ok(());
        }
        if let Err(e) = self.manager.recycle(&mut state.o) {
            tracing::debug!("disposing object after recycle failure");
            self.destroy_value(state.o);
            return Err(e);
        }
        self.insert_idle(state);
        Ok(())
    }

    /// Queues an object idle under a fresh item id, arming its eviction
    /// deadline on success.
    fn insert_idle(&self, state: ObjectState<M::Object>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot::new(state.o, self.config.retention, &self.reclaim);
        let item = Item::new(id, slot, state.status);
        match self.queue.offer(item) {
            Ok(()) => {
                if let (Some(evictor), Some(max_idle)) = (&self.evictor, self.config.max_idle_time)
                {
                    evictor.schedule(id, Instant::now() + max_idle);
                }
            }
            Err(item) => self.destroy_item(item),
        }
    }

    /// Disposes an object that never made it back to (or just left) the
    /// queue and compensates the live count.
    pub(crate) fn destroy_value(&self, o: M::Object) {
        self.manager.dispose(o);
        self.live.release_one();
    }

    /// Frees a live slot without disposing; the caller has taken ownership
    /// of the object.
    pub(crate) fn release_slot(&self) {
        self.live.release_one();
    }

    fn destroy_item(&self, mut item: Item<M::Object>) {
        let id = item.id();
        if let Some(evictor) = &self.evictor {
            evictor.cancel(id);
        }
        match item.take_value() {
            Some(o) => self.manager.dispose(o),
            None => tracing::trace!(item = id, "slot already shed; compensating live count"),
        }
        self.live.release_one();
    }

    fn drain_idle(&self) {
        while let Some(item) = self.queue.poll() {
            self.destroy_item(item);
        }
    }

    /// Called from the eviction thread when an item's idle deadline fires.
    /// A consumer that won the race leaves nothing to remove.
    pub(crate) fn evict_expired(&self, id: u64) {
        if let Some(item) = self.queue.remove(id) {
            tracing::debug!(item = id, "evicting object past max idle time");
            self.destroy_item(item);
        }
    }
}

impl<M: Manage> Drop for Pool<M> {
    fn drop(&mut self) {
        self.close();
    }
}
