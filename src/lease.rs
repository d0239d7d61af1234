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
use std::sync::Weak;

use crate::errors::PoolError;
use crate::manage::Manage;
use crate::manage::ObjectState;
use crate::manage::ObjectStatus;
use crate::pool::Pool;

/// Exclusive handle to one pooled object.
///
/// A lease makes exactly one terminal transition: the first of
/// [`release`](Lease::release) (the object re-enters the idle set) or
/// [`invalidate`](Lease::invalidate) (the object is disposed). Whichever
/// comes second, and any call after that, is a silent no-op; accessors fail
/// with [`PoolError::LeaseConsumed`] once the transition has happened.
///
/// Dropping an unterminated lease releases it, so a lease that merely goes
/// out of scope returns its object to the pool.
pub struct Lease<M: Manage> {
    state: Option<ObjectState<M::Object>>,
    pool: Weak<Pool<M>>,
}

impl<M> fmt::Debug for Lease<M>
where
    M: Manage,
    M::Object: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("state", &self.state).finish()
    }
}

impl<M: Manage> Lease<M> {
    pub(crate) fn new(state: ObjectState<M::Object>, pool: Weak<Pool<M>>) -> Self {
        Self {
            state: Some(state),
            pool,
        }
    }

    /// Returns a shared reference to the leased object.
    pub fn get(&self) -> Result<&M::Object, PoolError<M::Error>> {
        self.state
            .as_ref()
            .map(|state| &state.o)
            .ok_or(PoolError::LeaseConsumed)
    }

    /// Returns an exclusive reference to the leased object.
    pub fn get_mut(&mut self) -> Result<&mut M::Object, PoolError<M::Error>> {
        self.state
            .as_mut()
            .map(|state| &mut state.o)
            .ok_or(PoolError::LeaseConsumed)
    }

    /// Returns the status of the leased object, or `None` once the lease
    /// has terminated.
    pub fn status(&self) -> Option<ObjectStatus> {
        self.state.as_ref().map(|state| state.status)
    }

    /// Returns the object to the pool for reuse.
    ///
    /// On a closed pool the object is disposed instead. An error from
    /// [`Manage::recycle`] also disposes the object and surfaces here. If
    /// the lease already terminated this is a silent no-op.
    pub fn release(&mut self) -> Result<(), PoolError<M::Error>> {
        match self.state.take() {
            None => Ok(()),
            Some(state) => match self.pool.upgrade() {
                Some(pool) => pool.give_back(state).map_err(PoolError::Manager),
                None => Ok(()),
            },
        }
    }

    /// Destroys the object instead of returning it to the pool.
    ///
    /// The manager's [`dispose`](Manage::dispose) runs exactly once and the
    /// pool's live count shrinks, freeing a slot for lazy creation. If the
    /// lease already terminated this is a silent no-op.
    pub fn invalidate(&mut self) {
        if let Some(state) = self.state.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.destroy_value(state.o);
            }
        }
    }

    /// Runs `f` with the object and releases the lease afterwards.
    ///
    /// Release is guaranteed on every exit path: if `f` panics, the unwind
    /// drops the lease and the drop path releases the object back to the
    /// pool.
    pub fn with<R>(mut self, f: impl FnOnce(&mut M::Object) -> R) -> Result<R, PoolError<M::Error>> {
        let o = self
            .state
            .as_mut()
            .map(|state| &mut state.o)
            .ok_or(PoolError::LeaseConsumed)?;
        let r = f(o);
        self.release()?;
        Ok(r)
    }

    /// Removes the object from the pool and hands it to the caller.
    ///
    /// This reduces the pool's live count by one without invoking
    /// [`Manage::dispose`]; the caller owns the object from here on.
    /// Returns `None` if the lease already terminated.
    pub fn detach(mut self) -> Option<M::Object> {
        let state = self.state.take()?;
        if let Some(pool) = self.pool.upgrade() {
            pool.release_slot();
        }
        Some(state.o)
    }
}

impl<M: Manage> Drop for Lease<M> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            if let Some(pool) = self.pool.upgrade() {
                if pool.give_back(state).is_err() {
                    tracing::warn!("disposed object after recycle failure on lease drop");
                }
            }
        }
    }
}
