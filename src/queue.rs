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

use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use crate::manage::ObjectStatus;
use crate::mutex::Condvar;
use crate::mutex::Mutex;
use crate::retention::Slot;

/// Queue strategy when dequeuing idle objects from the pool.
#[derive(Debug, Default, Clone, Copy)]
pub enum QueueStrategy {
    /// First in first out.
    ///
    /// This strategy behaves like a queue.
    #[default]
    Fifo,
    /// Last in first out.
    ///
    /// This strategy behaves like a stack.
    Lifo,
}

/// One entry in the idle queue.
///
/// An item is created per insertion: releasing the same underlying value
/// twice yields two items with distinct ids, so a pending eviction for the
/// first insertion can never affect the second.
#[derive(Debug)]
pub(crate) struct Item<T> {
    id: u64,
    slot: Slot<T>,
    status: ObjectStatus,
}

impl<T> Item<T> {
    pub(crate) fn new(id: u64, slot: Slot<T>, status: ObjectStatus) -> Self {
        Self { id, slot, status }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn status(&self) -> ObjectStatus {
        self.status
    }

    /// Pulls the value out of the slot. `None` means the slot was emptied by
    /// memory-pressure shedding while the item sat in the queue.
    pub(crate) fn take_value(&mut self) -> Option<T> {
        self.slot.take()
    }
}

/// A bounded blocking deque of idle [`Item`]s.
///
/// `offer`/`poll` never block; `take` parks the calling thread until an item
/// is available or the queue shuts down; `poll_within` parks up to a
/// deadline. Shutting down wakes every parked taker and makes `offer` fail,
/// which is how a closing pool routes in-flight returns to disposal.
pub(crate) struct IdleQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
    strategy: QueueStrategy,
}

struct Inner<T> {
    deque: VecDeque<Item<T>>,
    capacity: usize,
    shutdown: bool,
}

impl<T> IdleQueue<T> {
    pub(crate) fn new(capacity: usize, strategy: QueueStrategy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                deque: VecDeque::with_capacity(capacity),
                capacity,
                shutdown: false,
            }),
            available: Condvar::new(),
            strategy,
        }
    }

    /// Inserts without blocking. Hands the item back when the queue is full
    /// or shut down.
    pub(crate) fn offer(&self, item: Item<T>) -> Result<(), Item<T>> {
        let mut inner = self.inner.lock();
        if inner.shutdown || inner.deque.len() >= inner.capacity {
            return Err(item);
        }
        inner.deque.push_back(item);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    pub(crate) fn poll(&self) -> Option<Item<T>> {
        let mut inner = self.inner.lock();
        match self.strategy {
            QueueStrategy::Fifo => inner.deque.pop_front(),
            QueueStrategy::Lifo => inner.deque.pop_back(),
        }
    }

    /// Blocks until an item is available. `None` only after shutdown.
    pub(crate) fn take(&self) -> Option<Item<T>> {
        let mut inner = self.inner.lock();
        loop {
            let polled = match self.strategy {
                QueueStrategy::Fifo => inner.deque.pop_front(),
                QueueStrategy::Lifo => inner.deque.pop_back(),
            };
            if let Some(item) = polled {
                return Some(item);
            }
            if inner.shutdown {
                return None;
            }
            inner = self.available.wait(inner);
        }
    }

    /// Blocks up to `timeout` for an item. `None` on timeout or shutdown.
    pub(crate) fn poll_within(&self, timeout: Duration) -> Option<Item<T>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            let polled = match self.strategy {
                QueueStrategy::Fifo => inner.deque.pop_front(),
                QueueStrategy::Lifo => inner.deque.pop_back(),
            };
            if let Some(item) = polled {
                return Some(item);
            }
            if inner.shutdown {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _timed_out) = self.available.wait_timeout(inner, deadline - now);
            inner = guard;
        }
    }

    /// Removes the item with the given insertion id, wherever it sits.
    pub(crate) fn remove(&self, id: u64) -> Option<Item<T>> {
        let mut inner = self.inner.lock();
        let index = inner.deque.iter().position(|item| item.id == id)?;
        inner.deque.remove(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().deque.len()
    }

    pub(crate) fn shutdown(&self) {
        self.inner.lock().shutdown = true;
        self.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::ReclaimSet;
    use crate::retention::Retention;

    fn item(id: u64, value: i32, reclaim: &ReclaimSet<i32>) -> Item<i32> {
        Item::new(
            id,
            Slot::new(value, Retention::Strong, reclaim),
            ObjectStatus::default(),
        )
    }

    #[test]
    fn test_offer_poll_fifo() {
        let reclaim = ReclaimSet::new();
        let queue = IdleQueue::new(2, QueueStrategy::Fifo);
        queue.offer(item(1, 10, &reclaim)).unwrap();
        queue.offer(item(2, 20, &reclaim)).unwrap();
        assert!(queue.offer(item(3, 30, &reclaim)).is_err());

        assert_eq!(queue.poll().unwrap().take_value(), Some(10));
        assert_eq!(queue.poll().unwrap().take_value(), Some(20));
        assert!(queue.poll().is_none());
    }

    #[test]
    fn test_poll_lifo() {
        let reclaim = ReclaimSet::new();
        let queue = IdleQueue::new(2, QueueStrategy::Lifo);
        queue.offer(item(1, 10, &reclaim)).unwrap();
        queue.offer(item(2, 20, &reclaim)).unwrap();
        assert_eq!(queue.poll().unwrap().take_value(), Some(20));
    }

    #[test]
    fn test_remove_by_id() {
        let reclaim = ReclaimSet::new();
        let queue = IdleQueue::new(3, QueueStrategy::Fifo);
        queue.offer(item(1, 10, &reclaim)).unwrap();
        queue.offer(item(2, 20, &reclaim)).unwrap();
        queue.offer(item(3, 30, &reclaim)).unwrap();

        assert_eq!(queue.remove(2).unwrap().take_value(), Some(20));
        assert!(queue.remove(2).is_none());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.poll().unwrap().take_value(), Some(10));
        assert_eq!(queue.poll().unwrap().take_value(), Some(30));
    }

    #[test]
    fn test_poll_within_times_out() {
        let queue: IdleQueue<i32> = IdleQueue::new(1, QueueStrategy::Fifo);
        let start = Instant::now();
        assert!(queue.poll_within(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_shutdown_wakes_taker() {
        use std::sync::Arc;

        let queue: Arc<IdleQueue<i32>> = Arc::new(IdleQueue::new(1, QueueStrategy::Fifo));
        let q = queue.clone();
        let taker = std::thread::spawn(move || q.take());
        std::thread::sleep(Duration::from_millis(50));
        queue.shutdown();
        assert!(taker.join().unwrap().is_none());

        let reclaim = ReclaimSet::new();
        assert!(queue.offer(item(1, 10, &reclaim)).is_err());
    }
}
