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

use std::convert::Infallible;
use std::time::Instant;

/// Statistics regarding an object returned by the pool.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStatus {
    created: Instant,
    pub(crate) recycled: Option<Instant>,
    pub(crate) recycle_count: usize,
}

impl Default for ObjectStatus {
    fn default() -> Self {
        Self {
            created: Instant::now(),
            recycled: None,
            recycle_count: 0,
        }
    }
}

impl ObjectStatus {
    /// Returns the instant when this object was created.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Returns the instant when this object was last handed out.
    pub fn last_used(&self) -> Instant {
        self.recycled.unwrap_or(self.created)
    }

    /// Returns the number of times the object was recycled.
    pub fn recycle_count(&self) -> usize {
        self.recycle_count
    }
}

/// A trait whose instance creates new objects and manages the lifecycle of
/// existing ones.
///
/// All methods except [`create`](Manage::create) have default
/// implementations, so a minimal manager only decides how objects come into
/// existence. The pool guarantees:
///
/// * [`recycle`](Manage::recycle) runs before an object enters (or re-enters)
///   the idle set; an `Err` routes the object to
///   [`dispose`](Manage::dispose) instead.
/// * [`is_valid`](Manage::is_valid) runs when an idle object is extracted;
///   `false` destroys the object and the extraction moves on to the next one.
/// * [`dispose`](Manage::dispose) runs exactly once per object that leaves
///   the pool permanently. Objects reclaimed by memory-pressure shedding are
///   dropped without passing through `dispose`, mirroring how a runtime
///   collector would reclaim them.
pub trait Manage: Send + Sync + 'static {
    /// The type of objects that this instance creates and manages.
    type Object: Send + 'static;

    /// The type of errors that this instance can return.
    type Error: Send + 'static;

    /// Creates a new object.
    fn create(&self) -> Result<Self::Object, Self::Error>;

    /// Scrubs an object before it is put back into the idle set.
    ///
    /// Returning an error destroys the object instead of re-queuing it; the
    /// error surfaces to the caller of [`Lease::release`](crate::Lease::release).
    fn recycle(&self, _o: &mut Self::Object) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Whether the idle object `o` is still fit for use.
    fn is_valid(&self, _o: &mut Self::Object, _status: &ObjectStatus) -> bool {
        true
    }

    /// Tears down an object that is leaving the pool permanently.
    ///
    /// The default implementation just drops the object.
    fn dispose(&self, o: Self::Object) {
        drop(o);
    }
}

/// A [`Manage`] implementation built from a plain constructor closure.
///
/// Recycling is a no-op, every object is considered valid, and disposal
/// drops the object. Use this when pooled objects need no lifecycle hooks:
///
/// ```
/// use leasepool::{Factory, Pool, PoolConfig};
///
/// let pool = Pool::new(PoolConfig::new(4), Factory::new(|| Vec::<u8>::with_capacity(1024)));
/// let buf = pool.get().unwrap();
/// assert_eq!(buf.get().unwrap().capacity(), 1024);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Factory<F> {
    create: F,
}

impl<F> Factory<F> {
    /// Creates a new [`Factory`] from the given constructor.
    pub fn new(create: F) -> Self {
        Self { create }
    }
}

impl<T, F> Manage for Factory<F>
where
    T: Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    type Object = T;
    type Error = Infallible;

    fn create(&self) -> Result<Self::Object, Self::Error> {
        Ok((self.create)())
    }
}

/// The object together with its statistics, as it travels between the idle
/// queue and a lease.
#[derive(Debug)]
pub(crate) struct ObjectState<T> {
    pub(crate) o: T,
    pub(crate) status: ObjectStatus,
}

impl<T> ObjectState<T> {
    pub(crate) fn new(o: T) -> Self {
        Self {
            o,
            status: ObjectStatus::default(),
        }
    }
}
