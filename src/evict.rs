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

//! Idle-eviction scheduling for pools with a finite max idle time.
//!
//! One dedicated thread per pool serves every eviction deadline. The thread
//! holds only a [`Weak`] reference to the pool, so dropping the pool while
//! the thread is parked does not leak it; the thread exits on the next
//! wake-up.
//!
//! Deadlines are keyed by item id, never by value: releasing the same value
//! twice produces two distinct ids, and a deadline armed for the first
//! insertion cannot touch the second. Cancellation is lazy. Consuming an
//! item drops its id from the pending set, and the stale heap entry is
//! skipped when it surfaces. The races this leaves open are benign by
//! construction: an elapsed deadline firing against an already-taken item
//! finds nothing to remove in the queue, and a deadline armed after its
//! cancellation (the insert hook racing a fast consumer) fires into the same
//! dead end.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Instant;

use crate::manage::Manage;
use crate::mutex::Condvar;
use crate::mutex::Mutex;
use crate::pool::Pool;

pub(crate) struct Evictor {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    wakeup: Condvar,
}

struct Inner {
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    pending: HashSet<u64>,
    shutdown: bool,
}

impl Evictor {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    deadlines: BinaryHeap::new(),
                    pending: HashSet::new(),
                    shutdown: false,
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    pub(crate) fn shared(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    /// Arms an eviction deadline for the item id. Silently refused after
    /// shutdown.
    pub(crate) fn schedule(&self, id: u64, deadline: Instant) {
        let mut inner = self.shared.inner.lock();
        if inner.shutdown {
            return;
        }
        inner.deadlines.push(Reverse((deadline, id)));
        inner.pending.insert(id);
        drop(inner);
        self.shared.wakeup.notify_one();
    }

    /// Disarms the deadline for the item id, if still pending.
    pub(crate) fn cancel(&self, id: u64) {
        self.shared.inner.lock().pending.remove(&id);
    }

    pub(crate) fn shutdown(&self) {
        self.shared.inner.lock().shutdown = true;
        self.shared.wakeup.notify_all();
    }
}

/// The scheduler loop. Runs on the pool's eviction thread until the pool is
/// shut down or dropped.
pub(crate) fn run<M: Manage>(shared: Arc<Shared>, pool: Weak<Pool<M>>) {
    loop {
        let due = {
            let mut inner = shared.inner.lock();
            loop {
                if inner.shutdown {
                    return;
                }

                let now = Instant::now();
                let mut due = Vec::new();
                while let Some(&Reverse((deadline, id))) = inner.deadlines.peek() {
                    if deadline > now {
                        break;
                    }
                    inner.deadlines.pop();
                    if inner.pending.remove(&id) {
                        due.push(id);
                    }
                }
                if !due.is_empty() {
                    break due;
                }

                match inner.deadlines.peek() {
                    Some(&Reverse((deadline, _))) => {
                        let wait = deadline.saturating_duration_since(now);
                        let (guard, _timed_out) = shared.wakeup.wait_timeout(inner, wait);
                        inner = guard;
                    }
                    None => inner = shared.wakeup.wait(inner),
                }
            }
        };

        match pool.upgrade() {
            Some(pool) => {
                for id in due {
                    pool.evict_expired(id);
                }
            }
            None => return,
        }
    }
}
