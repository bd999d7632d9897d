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

//! Observer interfaces for lock wait instrumentation.
//!
//! Observers let callers surface contention (metrics, progress output) without
//! touching the acquisition loop.

use crate::locking::adapter::LockTarget;
use std::fmt;
use std::time::Duration;

/// Why a release did not touch the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseSkip {
    /// The record was destroyed inside the critical section.
    Destroyed,
    /// The lease ran out before the critical section finished; another holder
    /// may already own the record.
    Expired,
}

impl fmt::Display for ReleaseSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseSkip::Destroyed => f.write_str("record destroyed"),
            ReleaseSkip::Expired => f.write_str("lock expired"),
        }
    }
}

/// Observer hooks for lock wait events.
pub trait LockWaitObserver: Send + Sync {
    /// A conditional acquire failed and the coordinator will sleep `delay`
    /// before attempt number `attempt`.
    fn on_retry(&self, _target: &LockTarget, _attempt: u32, _delay: Duration) {}

    fn on_acquired(&self, _target: &LockTarget, _attempts: u32, _waited: Duration) {}

    fn on_exhausted(&self, _target: &LockTarget, _attempts: u32, _waited: Duration) {}

    fn on_released(&self, _target: &LockTarget, _held: Duration) {}

    fn on_release_skipped(&self, _target: &LockTarget, _reason: ReleaseSkip) {}
}

/// Observer implementation that performs no work.
#[derive(Debug, Default)]
pub struct NoopLockWaitObserver;

impl LockWaitObserver for NoopLockWaitObserver {}
