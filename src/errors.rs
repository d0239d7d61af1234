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

use thiserror::Error;

/// The error returned by pool and lease operations.
///
/// Capacity exhaustion is not an error: [`Pool::try_get`](crate::Pool::try_get)
/// and [`Pool::get_timeout`](crate::Pool::get_timeout) report it as `Ok(None)`.
/// Transient conditions the pool recovers from on its own (a full queue on
/// release, an object failing validation, a shed slot) never surface here.
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The pool has been closed; no more objects can be obtained from it.
    #[error("pool is closed")]
    Closed,

    /// The lease has already been released or invalidated and no longer
    /// holds an object.
    #[error("lease no longer holds an object")]
    LeaseConsumed,

    /// The user-supplied [`Manage`](crate::Manage) implementation returned
    /// an error while creating or recycling an object.
    #[error("manager operation failed: {0}")]
    Manager(E),
}
