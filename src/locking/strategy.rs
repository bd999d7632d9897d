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

//! Holder naming and retry backoff strategies.
//!
//! Both are selected per record type through [`crate::config::LockerSettings`]:
//! a built-in variant referenced by identifier in settings files, or a
//! [`Custom`](BackoffAlgorithm::Custom) function installed programmatically.

use crate::clock::to_std;
use crate::error::{LockerError, Result};
use crate::locking::adapter::{LockAdapter, LockTarget};
use crate::store::RecordId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const SECURE_LOCKING_NAME: &str = "secure_locking_name";
pub const EXPONENTIAL_BACKOFF: &str = "exponential_backoff";
pub const LOCKED_AT_BACKOFF: &str = "locked_at_backoff";

/// Inputs available when generating a holder name.
#[derive(Debug, Clone, Copy)]
pub struct NamingContext<'a> {
    pub model: &'a str,
    pub id: &'a RecordId,
    pub attempt: u32,
}

/// Inputs available when computing the delay before the next attempt.
///
/// `attempt` counts failed attempts so far, so it is 1 for the first delay.
pub struct BackoffContext<'a> {
    pub target: &'a LockTarget,
    pub attempt: u32,
    pub lock_timeout: Duration,
    pub maximum_backoff: Duration,
    pub adapter: &'a dyn LockAdapter,
}

pub type NamingFn = dyn Fn(&NamingContext<'_>) -> String + Send + Sync;
pub type BackoffFn = dyn Fn(&BackoffContext<'_>) -> Result<Duration> + Send + Sync;

#[derive(Clone)]
pub enum NamingStrategy {
    Secure,
    Custom(Arc<NamingFn>),
}

impl NamingStrategy {
    pub fn custom<F>(generator: F) -> Self
    where
        F: Fn(&NamingContext<'_>) -> String + Send + Sync + 'static,
    {
        NamingStrategy::Custom(Arc::new(generator))
    }

    pub fn generate(&self, context: &NamingContext<'_>) -> String {
        match self {
            NamingStrategy::Secure => secure_locking_name(context),
            NamingStrategy::Custom(generator) => generator(context),
        }
    }

    /// Settings identifier, if the strategy is built in.
    pub fn identifier(&self) -> Option<&'static str> {
        match self {
            NamingStrategy::Secure => Some(SECURE_LOCKING_NAME),
            NamingStrategy::Custom(_) => None,
        }
    }
}

impl Default for NamingStrategy {
    fn default() -> Self {
        NamingStrategy::Secure
    }
}

impl fmt::Debug for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier().unwrap_or("custom"))
    }
}

impl PartialEq for NamingStrategy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NamingStrategy::Secure, NamingStrategy::Secure) => true,
            (NamingStrategy::Custom(a), NamingStrategy::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FromStr for NamingStrategy {
    type Err = LockerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            SECURE_LOCKING_NAME => Ok(NamingStrategy::Secure),
            other => Err(LockerError::InvalidParameterValue {
                parameter: "locking_name_generator".to_string(),
                details: format!("unknown naming strategy '{other}'"),
            }),
        }
    }
}

#[derive(Clone)]
pub enum BackoffAlgorithm {
    /// `2^attempt` seconds plus up to one second of jitter.
    Exponential,
    /// Remaining life of the lock currently stored on the record.
    LockedAt,
    Custom(Arc<BackoffFn>),
}

impl BackoffAlgorithm {
    pub fn custom<F>(algorithm: F) -> Self
    where
        F: Fn(&BackoffContext<'_>) -> Result<Duration> + Send + Sync + 'static,
    {
        BackoffAlgorithm::Custom(Arc::new(algorithm))
    }

    pub fn delay(&self, context: &BackoffContext<'_>) -> Result<Duration> {
        match self {
            BackoffAlgorithm::Exponential => Ok(exponential_backoff(context)),
            BackoffAlgorithm::LockedAt => locked_at_backoff(context),
            BackoffAlgorithm::Custom(algorithm) => algorithm(context),
        }
    }

    pub fn identifier(&self) -> Option<&'static str> {
        match self {
            BackoffAlgorithm::Exponential => Some(EXPONENTIAL_BACKOFF),
            BackoffAlgorithm::LockedAt => Some(LOCKED_AT_BACKOFF),
            BackoffAlgorithm::Custom(_) => None,
        }
    }
}

impl Default for BackoffAlgorithm {
    fn default() -> Self {
        BackoffAlgorithm::Exponential
    }
}

impl fmt::Debug for BackoffAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier().unwrap_or("custom"))
    }
}

impl PartialEq for BackoffAlgorithm {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BackoffAlgorithm::Exponential, BackoffAlgorithm::Exponential) => true,
            (BackoffAlgorithm::LockedAt, BackoffAlgorithm::LockedAt) => true,
            (BackoffAlgorithm::Custom(a), BackoffAlgorithm::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FromStr for BackoffAlgorithm {
    type Err = LockerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            EXPONENTIAL_BACKOFF => Ok(BackoffAlgorithm::Exponential),
            LOCKED_AT_BACKOFF => Ok(BackoffAlgorithm::LockedAt),
            other => Err(LockerError::InvalidParameterValue {
                parameter: "backoff_algorithm".to_string(),
                details: format!("unknown backoff algorithm '{other}'"),
            }),
        }
    }
}

/// Random URL-safe token followed by `#<attempt>`, e.g. `zLmulhOy9yn_NE886OWNYw#1`.
pub fn secure_locking_name(context: &NamingContext<'_>) -> String {
    let token = URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
    format!("{token}#{}", context.attempt)
}

pub fn exponential_backoff(context: &BackoffContext<'_>) -> Duration {
    let exponent = i32::try_from(context.attempt).unwrap_or(i32::MAX);
    let seconds = 2f64.powi(exponent) + rand::random::<f64>();
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

/// Waits out the stored lock. Returns `maximum_backoff` once `attempt * lock_timeout`
/// reaches it, zero when the record is no longer locked or the stored expiry has
/// already passed.
pub fn locked_at_backoff(context: &BackoffContext<'_>) -> Result<Duration> {
    let waited = context.lock_timeout.as_secs_f64() * f64::from(context.attempt);
    if waited >= context.maximum_backoff.as_secs_f64() {
        return Ok(context.maximum_backoff);
    }

    let Some(expiry) = context
        .adapter
        .current_lock_expiry(context.target, context.lock_timeout)?
    else {
        return Ok(Duration::ZERO);
    };

    let now = context.adapter.now()?;
    Ok(to_std(expiry.signed_duration_since(now)))
}
