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

use crate::config::LockerSettings;
use crate::error::Result;
use crate::locking::adapter::{LockAdapter, LockTarget};
use crate::locking::handle::LockHandle;
use crate::locking::state::LockFields;
use crate::locking::strategy::{BackoffContext, NamingContext};
use crate::locking::wait_observer::LockWaitObserver;
use std::time::{Duration, Instant};

/// How many conditional updates one `with_lock` call may issue.
///
/// `Limited(n)` gives up once `n` attempts have failed, so `0` and `1` both mean
/// a single attempt. `Unlimited` retries until the backoff reaches
/// `maximum_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retries {
    Limited(u32),
    Unlimited,
}

impl Retries {
    pub fn is_exhausted(self, failed_attempts: u32) -> bool {
        match self {
            Retries::Limited(limit) => failed_attempts >= limit,
            Retries::Unlimited => false,
        }
    }
}

impl Default for Retries {
    fn default() -> Self {
        Retries::Limited(0)
    }
}

impl From<u32> for Retries {
    fn from(value: u32) -> Self {
        Retries::Limited(value)
    }
}

/// Per-call options for `with_lock`.
#[derive(Debug, Clone, PartialEq)]
pub struct LockOptions {
    retries: Retries,
    retry_sleep: Option<Duration>,
    timeout: Option<Duration>,
    reload: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            retries: Retries::default(),
            retry_sleep: None,
            timeout: None,
            reload: true,
        }
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, retries: impl Into<Retries>) -> Self {
        self.retries = retries.into();
        self
    }

    pub fn retry_forever(mut self) -> Self {
        self.retries = Retries::Unlimited;
        self
    }

    /// Fixed delay between attempts, bypassing the backoff algorithm and its
    /// `maximum_backoff` bound.
    pub fn with_retry_sleep(mut self, delay: Duration) -> Self {
        self.retry_sleep = Some(delay);
        self
    }

    /// Lock timeout for this call instead of the record type's `lock_timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn retries(&self) -> Retries {
        self.retries
    }

    pub fn retry_sleep(&self) -> Option<Duration> {
        self.retry_sleep
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn reload(&self) -> bool {
        self.reload
    }
}

/// State of one acquisition loop. Owned by the calling thread for the duration
/// of a single `with_lock` call.
pub struct LockAttempt<'a> {
    target: &'a LockTarget,
    settings: &'a LockerSettings,
    options: &'a LockOptions,
    observer: Option<&'a dyn LockWaitObserver>,
    attempt: u32,
    holder_name: String,
    started_at: Instant,
}

impl<'a> LockAttempt<'a> {
    pub fn new(
        target: &'a LockTarget,
        settings: &'a LockerSettings,
        options: &'a LockOptions,
    ) -> Self {
        Self {
            target,
            settings,
            options,
            observer: None,
            attempt: 0,
            holder_name: String::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn LockWaitObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn target(&self) -> &LockTarget {
        self.target
    }

    /// Zero-based number of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout().unwrap_or(self.settings.lock_timeout)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Generates the holder name for the current attempt.
    pub fn next_holder_name(&mut self) -> &str {
        self.holder_name = self
            .settings
            .locking_name_generator
            .generate(&NamingContext {
                model: self.target.model_name(),
                id: &self.target.id,
                attempt: self.attempt,
            });
        &self.holder_name
    }

    pub fn record_failure(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Delay before the next attempt, or `None` when the loop must give up.
    pub fn next_delay(&self, adapter: &dyn LockAdapter) -> Result<Option<Duration>> {
        if self.options.retries().is_exhausted(self.attempt) {
            return Ok(None);
        }

        if let Some(delay) = self.options.retry_sleep() {
            return Ok(Some(delay));
        }

        let delay = self.settings.backoff_algorithm.delay(&BackoffContext {
            target: self.target,
            attempt: self.attempt,
            lock_timeout: self.timeout(),
            maximum_backoff: self.settings.maximum_backoff,
            adapter,
        })?;
        if delay >= self.settings.maximum_backoff {
            return Ok(None);
        }
        Ok(Some(delay))
    }

    pub fn notify_retry(&self, delay: Duration) {
        if let Some(observer) = self.observer {
            observer.on_retry(self.target, self.attempt, delay);
        }
    }

    pub fn notify_acquired(&self) {
        if let Some(observer) = self.observer {
            observer.on_acquired(self.target, self.attempt + 1, self.elapsed());
        }
    }

    pub fn notify_exhausted(&self) {
        if let Some(observer) = self.observer {
            observer.on_exhausted(self.target, self.attempt, self.elapsed());
        }
    }

    /// Converts a successful conditional update into the in-memory handle.
    pub fn into_handle(self, fields: LockFields) -> LockHandle {
        let timeout = self.timeout();
        let holder_name = fields.holder_name.unwrap_or(self.holder_name);
        LockHandle::new(holder_name, fields.locked_at, timeout, self.attempt + 1)
    }
}
