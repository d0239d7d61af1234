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

use std::sync::Arc;
use std::sync::Weak;

use crate::mutex::Mutex;

/// How strongly the pool holds on to idle objects.
///
/// Rust has no reclaiming runtime, so the soft and weak modes are driven by
/// an application-reported pressure signal instead of a garbage collector:
/// wire your low-memory hook to [`Pool::shed_idle`](crate::Pool::shed_idle)
/// and idle objects become reclaimable without a dedicated eviction thread.
///
/// Shed values are dropped, not passed to [`Manage::dispose`](crate::Manage::dispose),
/// mirroring how a collector reclaims memory without running user teardown.
/// Objects currently leased out are never affected; only idle slots shed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Idle objects are always retained.
    #[default]
    Strong,
    /// Idle objects may be shed under critical memory pressure.
    Soft,
    /// Idle objects may be shed under any memory pressure.
    Weak,
}

impl Retention {
    pub(crate) fn sheds_at(self, pressure: MemoryPressure) -> bool {
        match self {
            Retention::Strong => false,
            Retention::Soft => pressure == MemoryPressure::Critical,
            Retention::Weak => true,
        }
    }
}

/// The pressure level reported to [`Pool::shed_idle`](crate::Pool::shed_idle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    /// Memory is tight; release what is cheap to rebuild.
    Moderate,
    /// Memory is critically low; release everything that can be released.
    Critical,
}

/// Holder for one pooled value.
///
/// Strong slots own the value inline. Soft/weak slots share a cell with the
/// pool's reclaim set so that shedding can empty them while the item sits in
/// the idle queue. Once the value is taken the slot stays empty; an emptied
/// slot observed at extraction is the signal that the value was shed.
#[derive(Debug)]
pub(crate) enum Slot<T> {
    Held(Option<T>),
    Shared(Arc<SlotCell<T>>),
}

#[derive(Debug)]
pub(crate) struct SlotCell<T> {
    value: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    pub(crate) fn new(value: T, retention: Retention, reclaim: &ReclaimSet<T>) -> Self {
        match retention {
            Retention::Strong => Slot::Held(Some(value)),
            Retention::Soft | Retention::Weak => {
                let cell = Arc::new(SlotCell {
                    value: Mutex::new(Some(value)),
                });
                reclaim.register(Arc::downgrade(&cell));
                Slot::Shared(cell)
            }
        }
    }

    pub(crate) fn take(&mut self) -> Option<T> {
        match self {
            Slot::Held(value) => value.take(),
            Slot::Shared(cell) => cell.value.lock().take(),
        }
    }
}

/// The per-pool registry of sheddable slot cells.
///
/// Entries are weak: a cell dies with its item, and dead entries are pruned
/// on the next shed pass.
#[derive(Debug)]
pub(crate) struct ReclaimSet<T> {
    cells: Mutex<Vec<Weak<SlotCell<T>>>>,
}

impl<T> ReclaimSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            cells: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, cell: Weak<SlotCell<T>>) {
        self.cells.lock().push(cell);
    }

    /// Empties every registered cell permitted to shed at `pressure`,
    /// returning the number of values released.
    pub(crate) fn shed(&self, retention: Retention, pressure: MemoryPressure) -> usize {
        if !retention.sheds_at(pressure) {
            return 0;
        }

        let mut cells = self.cells.lock();
        let mut shed = 0;
        cells.retain(|weak| match weak.upgrade() {
            Some(cell) => {
                if cell.value.lock().take().is_some() {
                    shed += 1;
                }
                true
            }
            None => false,
        });
        shed
    }
}
