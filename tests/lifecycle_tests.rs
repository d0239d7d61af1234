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

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use leasepool::Manage;
use leasepool::Pool;
use leasepool::PoolConfig;
use leasepool::PoolError;

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    recycled: AtomicUsize,
    disposed: AtomicUsize,
    fail_recycle: AtomicBool,
}

struct TrackingManager {
    counters: Arc<Counters>,
}

impl TrackingManager {
    fn new() -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                counters: counters.clone(),
            },
            counters,
        )
    }
}

impl Manage for TrackingManager {
    type Object = usize;
    type Error = String;

    fn create(&self) -> Result<Self::Object, Self::Error> {
        Ok(self.counters.created.fetch_add(1, Ordering::SeqCst))
    }

    fn recycle(&self, _o: &mut Self::Object) -> Result<(), Self::Error> {
        if self.counters.fail_recycle.load(Ordering::SeqCst) {
            return Err("object cannot be reused".to_owned());
        }
        self.counters.recycled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&self, _o: Self::Object) {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_fill_then_drain_round_trip() {
    const CAPACITY: usize = 3;

    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(CAPACITY), manager);

    pool.fill().unwrap();
    assert_eq!(pool.live(), CAPACITY);
    assert_eq!(pool.idle_count(), CAPACITY);
    assert_eq!(counters.created.load(Ordering::SeqCst), CAPACITY);

    pool.drain().unwrap();
    assert_eq!(pool.live(), 0);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(counters.disposed.load(Ordering::SeqCst), CAPACITY);
}

#[test]
fn test_release_round_trip_reuses_objects() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(2), manager);
    pool.fill().unwrap();

    for _ in 0..10 {
        let lease = pool.get().unwrap();
        drop(lease);
    }

    assert_eq!(pool.live(), 2);
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_release_and_invalidate_are_one_shot() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);

    let mut lease = pool.get().unwrap();
    lease.release().unwrap();
    assert!(matches!(lease.get(), Err(PoolError::LeaseConsumed)));

    // Subsequent transitions are silent no-ops.
    lease.release().unwrap();
    lease.invalidate();
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 0);
    assert_eq!(pool.live(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn test_invalidate_disposes_and_frees_slot() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);

    let mut lease = pool.get().unwrap();
    lease.invalidate();
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.live(), 0);

    // The freed slot admits a fresh object.
    let lease = pool.get().unwrap();
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);
    drop(lease);
}

#[test]
fn test_closed_pool_rejects_operations() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(2), manager);
    pool.fill().unwrap();
    let mut lease = pool.get().unwrap();

    pool.close();
    assert!(matches!(pool.get(), Err(PoolError::Closed)));
    assert!(matches!(pool.try_get(), Err(PoolError::Closed)));
    assert!(matches!(pool.fill(), Err(PoolError::Closed)));
    assert!(matches!(pool.drain(), Err(PoolError::Closed)));

    // The idle object was disposed by the close itself.
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.idle_count(), 0);

    // Releasing into a closed pool disposes instead of re-queuing.
    lease.release().unwrap();
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.live(), 0);

    // Closing again changes nothing.
    pool.close();
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_close_wakes_blocked_getter() {
    let (manager, _counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);
    let _lease = pool.get().unwrap();

    let p = pool.clone();
    let waiter = std::thread::spawn(move || p.get());
    std::thread::sleep(std::time::Duration::from_millis(50));
    pool.close();

    assert!(matches!(waiter.join().unwrap(), Err(PoolError::Closed)));
}

#[test]
fn test_recycle_failure_disposes_on_release() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);

    let mut lease = pool.get().unwrap();
    counters.fail_recycle.store(true, Ordering::SeqCst);

    let result = lease.release();
    assert!(matches!(result, Err(PoolError::Manager(_))));
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.live(), 0);
    assert_eq!(pool.idle_count(), 0);

    // The error consumed the lease; nothing happens twice.
    counters.fail_recycle.store(false, Ordering::SeqCst);
    lease.release().unwrap();
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_with_runs_and_releases() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);

    let doubled = pool.get().unwrap().with(|o| *o * 2).unwrap();
    assert_eq!(doubled, 0);
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_with_releases_on_panic() {
    let (manager, _counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);

    let p = pool.clone();
    let handle = std::thread::spawn(move || {
        let lease = p.get().unwrap();
        let _ = lease.with(|_| panic!("boom"));
    });
    assert!(handle.join().is_err());

    // Release-only semantics: the unwound lease went back to the pool.
    assert_eq!(pool.live(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn test_detach_removes_without_dispose() {
    let (manager, counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(1), manager);

    let lease = pool.get().unwrap();
    let value = lease.detach().unwrap();
    assert_eq!(value, 0);
    assert_eq!(pool.live(), 0);
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 0);

    // The detached slot is free for a fresh object.
    let lease = pool.get().unwrap();
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);
    drop(lease);
}

#[test]
fn test_status_snapshot() {
    let (manager, _counters) = TrackingManager::new();
    let pool = Pool::new(PoolConfig::new(3), manager);
    pool.fill().unwrap();
    let _lease = pool.get().unwrap();

    let status = pool.status();
    assert_eq!(status.capacity, 3);
    assert_eq!(status.live, 3);
    assert_eq!(status.idle, 2);
    assert_eq!(status.leased, 1);
}
