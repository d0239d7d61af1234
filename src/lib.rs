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

#![deny(missing_docs)]

//! Leasepool provides fast, thread-safe object pools for expensive-to-build
//! objects such as database connections, large buffers, or parsers.
//!
//! A [`Pool`] keeps a bounded population of live objects. Callers obtain a
//! [`Lease`] granting exclusive use of one object and either release it
//! (returning it for reuse) or invalidate it (destroying it). Objects are
//! created lazily through a [`Manage`] implementation, up to the configured
//! capacity; once the ceiling is reached, [`Pool::get`] parks the calling
//! thread until a lease comes back.
//!
//! # Acquisition
//!
//! Three flavors share one admission sequence (idle queue first, lazy
//! creation second, waiting last):
//!
//! * [`Pool::get`] blocks indefinitely,
//! * [`Pool::try_get`] never blocks,
//! * [`Pool::get_timeout`] blocks up to a deadline.
//!
//! ## Examples
//!
//! Pool plain values with a constructor closure:
//!
//! ```
//! use leasepool::Factory;
//! use leasepool::Pool;
//! use leasepool::PoolConfig;
//!
//! let pool = Pool::new(PoolConfig::new(2), Factory::new(|| Vec::<u8>::with_capacity(4096)));
//!
//! let mut buf = pool.get().unwrap();
//! buf.get_mut().unwrap().extend_from_slice(b"hello");
//! drop(buf); // dropping an active lease releases it back to the pool
//!
//! let buf = pool.get().unwrap();
//! assert_eq!(buf.get().unwrap().capacity(), 4096);
//! assert_eq!(pool.status().live, 1);
//! ```
//!
//! Manage the full object lifecycle with a [`Manage`] implementation:
//!
//! ```
//! use std::time::Duration;
//!
//! use leasepool::Manage;
//! use leasepool::ObjectStatus;
//! use leasepool::Pool;
//! use leasepool::PoolConfig;
//! use leasepool::PoolError;
//!
//! struct Conn {
//!     healthy: bool,
//! }
//!
//! struct Manager;
//!
//! impl Manage for Manager {
//!     type Object = Conn;
//!     type Error = std::io::Error;
//!
//!     fn create(&self) -> Result<Conn, Self::Error> {
//!         Ok(Conn { healthy: true })
//!     }
//!
//!     fn is_valid(&self, conn: &mut Conn, _status: &ObjectStatus) -> bool {
//!         conn.healthy
//!     }
//! }
//!
//! let config = PoolConfig::new(8).with_max_idle_time(Duration::from_secs(30));
//! let pool = Pool::new(config, Manager);
//!
//! let conn = pool.get().unwrap();
//! assert!(conn.get().unwrap().healthy);
//! drop(conn);
//!
//! pool.close();
//! assert!(matches!(pool.get(), Err(PoolError::Closed)));
//! ```
//!
//! # Idle eviction
//!
//! A finite [`PoolConfig::max_idle_time`] turns on idle eviction: each
//! object returned to the idle set is destroyed after sitting unused for
//! that long. One background thread per pool serves the deadlines; it holds
//! no strong reference to the pool and exits when the pool is closed or
//! dropped.
//!
//! # Memory pressure
//!
//! With [`Retention::Soft`] or [`Retention::Weak`], idle objects become
//! reclaimable through [`Pool::shed_idle`]. Wire it to the application's
//! low-memory signal and the pool gives idle memory back without disturbing
//! leased objects. See [`Retention`] for the exact semantics.

pub use errors::PoolError;
pub use lease::Lease;
pub use manage::Factory;
pub use manage::Manage;
pub use manage::ObjectStatus;
pub use pool::Pool;
pub use pool::PoolConfig;
pub use pool::PoolStatus;
pub use queue::QueueStrategy;
pub use retention::MemoryPressure;
pub use retention::Retention;

mod errors;
mod evict;
mod lease;
mod manage;
mod mutex;
mod pool;
mod queue;
mod retention;
