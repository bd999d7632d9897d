// Copyright 2025 dentsusoken
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

use crate::error::Result;
use crate::locking::adapter::LockTarget;
use crate::locking::controller::LockCoordinator;
use crate::record::{Lockable, Record};
use log::warn;

/// Releases a lock taken by `with_lock` on every exit path, panics included.
///
/// The critical section reaches the record through [`ReleaseGuard::lockable`].
/// Dropping the guard without calling [`ReleaseGuard::release`] releases the lock
/// and logs a failure instead of returning it.
pub struct ReleaseGuard<'a, R: Record> {
    coordinator: &'a LockCoordinator,
    target: LockTarget,
    lockable: &'a mut Lockable<R>,
    armed: bool,
}

impl<'a, R: Record> ReleaseGuard<'a, R> {
    pub(crate) fn new(
        coordinator: &'a LockCoordinator,
        target: LockTarget,
        lockable: &'a mut Lockable<R>,
    ) -> Self {
        Self {
            coordinator,
            target,
            lockable,
            armed: true,
        }
    }

    pub fn target(&self) -> &LockTarget {
        &self.target
    }

    pub fn lockable(&mut self) -> &mut Lockable<R> {
        self.lockable
    }

    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.coordinator.release(&self.target, &mut *self.lockable)
    }
}

impl<R: Record> Drop for ReleaseGuard<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(err) = self.coordinator.release(&self.target, &mut *self.lockable) {
            warn!(
                "Failed to release lock on {} '{}': {err}",
                self.target.model_name(),
                self.target.id
            );
        }
    }
}
