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

use crate::clock::{Clock, SystemClock};
use crate::error::{LockerError, Result};
use crate::locking::acquisition::{LockAttempt, LockOptions};
use crate::locking::adapter::{DocumentLockAdapter, LockAdapter, LockTarget};
use crate::locking::handle::LockHandle;
use crate::locking::scoped_guard::ReleaseGuard;
use crate::locking::state::LockState;
use crate::locking::wait_observer::{LockWaitObserver, NoopLockWaitObserver, ReleaseSkip};
use crate::model::LockModel;
use crate::record::{Lockable, Record};
use crate::store::{DocumentStore, RecordId, Value};
use log::{debug, trace, warn};
use std::sync::Arc;

/// Drives the `with_lock` protocol: acquire through the adapter, run the critical
/// section, release on every exit path.
pub struct LockCoordinator {
    adapter: Arc<dyn LockAdapter>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn LockWaitObserver>,
}

impl LockCoordinator {
    pub fn new(adapter: Arc<dyn LockAdapter>) -> Self {
        Self {
            adapter,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopLockWaitObserver),
        }
    }

    /// Coordinator over a document store, using the store's clock when it reports
    /// one and the system clock otherwise.
    pub fn for_store(store: Arc<dyn DocumentStore>) -> Result<Self> {
        Self::for_store_with_clock(store, Arc::new(SystemClock))
    }

    pub fn for_store_with_clock(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let adapter = DocumentLockAdapter::detect(store, Arc::clone(&clock))?;
        Ok(Self::new(Arc::new(adapter)).with_clock(clock))
    }

    /// Clock used for sleeping between attempts and for the release expiry check.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LockWaitObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn LockAdapter> {
        &self.adapter
    }

    /// Runs `critical` while holding the record's lock.
    ///
    /// Unpersisted records run unprotected. A record already locked by an
    /// enclosing `with_lock` on the same object runs without acquiring again.
    /// Errors from `critical` are returned unchanged once the lock is released.
    pub fn with_lock<R, T, E, F>(
        &self,
        lockable: &mut Lockable<R>,
        options: &LockOptions,
        critical: F,
    ) -> std::result::Result<T, E>
    where
        R: Record,
        E: From<LockerError>,
        F: FnOnce(&mut Lockable<R>) -> std::result::Result<T, E>,
    {
        if !lockable.is_persisted() {
            trace!(
                "{} '{}' is not persisted; running without a lock",
                lockable.model().name(),
                lockable.id()
            );
            return critical(lockable);
        }

        if lockable.has_lock() {
            trace!(
                "{} '{}' already holds its lock; nested call",
                lockable.model().name(),
                lockable.id()
            );
            return critical(lockable);
        }

        let target = lockable.model().target().record(lockable.id().clone());
        let handle = self.acquire(&target, lockable.model(), options)?;
        let holder_name = handle.holder_name().to_string();
        let locked_at = handle.locked_at();
        lockable.set_lock(handle);

        let mut guard = ReleaseGuard::new(self, target, lockable);
        sync_lock_fields(guard.lockable(), options.reload(), holder_name, locked_at)?;

        match critical(guard.lockable()) {
            Ok(value) => {
                guard.release()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(release_err) = guard.release() {
                    warn!("Failed to release lock after critical section error: {release_err}");
                }
                Err(err)
            }
        }
    }

    fn acquire(
        &self,
        target: &LockTarget,
        model: &LockModel,
        options: &LockOptions,
    ) -> Result<LockHandle> {
        let settings = model.settings();
        let mut attempt = LockAttempt::new(target, &settings, options)
            .with_observer(Some(self.observer.as_ref()));

        loop {
            let holder_name = attempt.next_holder_name().to_string();
            let acquired = self
                .adapter
                .conditional_acquire(target, &holder_name, attempt.timeout())?;
            if let Some(fields) = acquired {
                attempt.notify_acquired();
                debug!(
                    "Acquired lock on {} '{}' as {holder_name} after {} attempt(s) in {:.3}s",
                    target.model_name(),
                    target.id,
                    attempt.attempt() + 1,
                    attempt.elapsed().as_secs_f64()
                );
                return Ok(attempt.into_handle(fields));
            }

            attempt.record_failure();
            match attempt.next_delay(self.adapter.as_ref())? {
                Some(delay) => {
                    trace!(
                        "Lock on {} '{}' is busy; retrying in {:.3}s (attempt {})",
                        target.model_name(),
                        target.id,
                        delay.as_secs_f64(),
                        attempt.attempt()
                    );
                    attempt.notify_retry(delay);
                    self.clock.sleep(delay);
                }
                None => {
                    attempt.notify_exhausted();
                    debug!(
                        "Giving up on lock for {} '{}' after {} attempt(s)",
                        target.model_name(),
                        target.id,
                        attempt.attempt()
                    );
                    return Err(LockerError::lock_not_acquired(
                        target.model_name(),
                        &target.id,
                    ));
                }
            }
        }
    }

    /// Releases the lock held by `lockable`, if any. Skips the store when the
    /// record was destroyed or the lease already ran out.
    pub(crate) fn release<R: Record>(
        &self,
        target: &LockTarget,
        lockable: &mut Lockable<R>,
    ) -> Result<()> {
        let Some(handle) = lockable.take_lock() else {
            return Ok(());
        };

        if lockable.is_destroyed() {
            debug!(
                "{} '{}' was destroyed while locked; nothing to release",
                target.model_name(),
                target.id
            );
            self.observer.on_release_skipped(target, ReleaseSkip::Destroyed);
            return Ok(());
        }

        if handle.is_expired(self.clock.now()) {
            warn!(
                "Lock on {} '{}' expired after {:.3}s, before the critical section finished",
                target.model_name(),
                target.id,
                handle.elapsed().as_secs_f64()
            );
            self.observer.on_release_skipped(target, ReleaseSkip::Expired);
        } else {
            let released = self
                .adapter
                .conditional_release(target, handle.holder_name())?;
            if released {
                debug!(
                    "Released lock on {} '{}' after {:.3}s",
                    target.model_name(),
                    target.id,
                    handle.elapsed().as_secs_f64()
                );
            } else {
                warn!(
                    "Lock on {} '{}' was no longer held by {}",
                    target.model_name(),
                    target.id,
                    handle.holder_name()
                );
            }
            self.observer.on_released(target, handle.elapsed());
        }

        lockable.write_attribute(&target.model.locking_name_field, Value::Null)?;
        lockable.write_attribute(&target.model.locked_at_field, Value::Null)?;
        Ok(())
    }

    /// Lock state of the stored record, evaluated against store time.
    pub fn lock_state<R: Record>(&self, lockable: &Lockable<R>) -> Result<LockState> {
        if !lockable.is_persisted() {
            return Ok(LockState::Unlocked);
        }
        let model = lockable.model();
        let target = model.target().record(lockable.id().clone());
        let Some(fields) = self.adapter.lock_fields(&target)? else {
            return Ok(LockState::Unlocked);
        };
        Ok(fields.state(model.settings().lock_timeout, self.adapter.now()?))
    }

    /// Whether the stored record is locked by anyone, this process included.
    pub fn is_locked<R: Record>(&self, lockable: &Lockable<R>) -> Result<bool> {
        Ok(self.lock_state(lockable)?.is_locked())
    }

    /// Ids of records of `model` holding a live lock.
    pub fn locked(&self, model: &LockModel) -> Result<Vec<RecordId>> {
        self.adapter
            .locked_ids(&model.target(), model.settings().lock_timeout)
    }

    /// Ids of records of `model` without a live lock.
    pub fn unlocked(&self, model: &LockModel) -> Result<Vec<RecordId>> {
        self.adapter
            .unlocked_ids(&model.target(), model.settings().lock_timeout)
    }

    /// Clears lock fields on every record of `model`, live locks included.
    pub fn unlock_all(&self, model: &LockModel) -> Result<u64> {
        let cleared = self.adapter.unlock_all(&model.target())?;
        debug!("Cleared {cleared} lock(s) on {}", model.name());
        Ok(cleared)
    }
}

fn sync_lock_fields<R: Record>(
    lockable: &mut Lockable<R>,
    reload: bool,
    holder_name: String,
    locked_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<()> {
    let settings = lockable.model().settings();
    if reload {
        lockable.reload()?;
        lockable.read_attribute(&settings.locking_name_field)?;
        lockable.read_attribute(&settings.locked_at_field)?;
        return Ok(());
    }
    lockable.write_attribute(&settings.locking_name_field, Value::from(holder_name))?;
    lockable.write_attribute(&settings.locked_at_field, Value::from(locked_at))?;
    Ok(())
}
