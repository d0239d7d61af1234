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
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::WaitTimeoutResult;
use std::time::Duration;

pub(crate) struct Mutex<T: ?Sized>(std::sync::Mutex<T>);

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> Mutex<T> {
    pub(crate) const fn new(t: T) -> Self {
        Self(std::sync::Mutex::new(t))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Companion to [`Mutex`]: a condition variable that recovers the guard from
/// a poisoned lock instead of propagating the poison.
pub(crate) struct Condvar(std::sync::Condvar);

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Condvar {
    pub(crate) const fn new() -> Self {
        Self(std::sync::Condvar::new())
    }

    pub(crate) fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.0.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        self.0
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify_one(&self) {
        self.0.notify_one();
    }

    pub(crate) fn notify_all(&self) {
        self.0.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_poison_mutex() {
        let mutex = Arc::new(Mutex::new(42));
        let m = mutex.clone();
        let handle = std::thread::spawn(move || {
            let _guard = m.lock();
            panic!("poison");
        });
        let _ = handle.join();
        let guard = mutex.lock();
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_poison_condvar() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let p = pair.clone();
        let handle = std::thread::spawn(move || {
            let (lock, cv) = &*p;
            let mut ready = lock.lock();
            *ready = true;
            cv.notify_one();
            panic!("poison");
        });
        let _ = handle.join();

        let (lock, cv) = &*pair;
        let mut ready = lock.lock();
        while !*ready {
            let (guard, _timed_out) = cv.wait_timeout(ready, Duration::from_millis(100));
            ready = guard;
        }
        assert!(*ready);
    }
}
