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

use crate::locking::state::LockFields;
use crate::locking::timeout::{expires_at, is_expired};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// In-memory proof that this process currently holds a record's lock.
///
/// Lives on the [`Lockable`](crate::record::Lockable) wrapper while the
/// outermost `with_lock` call on it is running; nested calls see it and skip
/// acquisition.
#[derive(Debug, Clone)]
pub struct LockHandle {
    holder_name: String,
    locked_at: Option<DateTime<Utc>>,
    timeout: Duration,
    attempts: u32,
    acquired_at: Instant,
}

impl LockHandle {
    pub(crate) fn new(
        holder_name: String,
        locked_at: Option<DateTime<Utc>>,
        timeout: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            holder_name,
            locked_at,
            timeout,
            attempts,
            acquired_at: Instant::now(),
        }
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    /// Timestamp written by the store when the lock was taken.
    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.locked_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of conditional updates issued to obtain the lock.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.locked_at.map(|locked_at| expires_at(locked_at, self.timeout))
    }

    /// Whether the lease has run out at `now`. A handle without a stored
    /// timestamp never reports expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.locked_at
            .is_some_and(|locked_at| is_expired(locked_at, self.timeout, now))
    }

    pub fn fields(&self) -> LockFields {
        LockFields {
            holder_name: Some(self.holder_name.clone()),
            locked_at: self.locked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn handle_expiry_follows_timeout() {
        let locked_at = Utc.with_ymd_and_hms(2024, 3, 19, 7, 51, 24).unwrap();
        let handle = LockHandle::new(
            "abc#0".to_string(),
            Some(locked_at),
            Duration::from_secs(5),
            1,
        );

        assert_eq!(
            handle.expires_at(),
            Some(locked_at + chrono::Duration::seconds(5))
        );
        assert!(!handle.is_expired(locked_at + chrono::Duration::seconds(4)));
        assert!(handle.is_expired(locked_at + chrono::Duration::seconds(5)));
        assert_eq!(handle.fields(), LockFields::new("abc#0", locked_at));
    }

    #[test]
    fn handle_without_timestamp_never_expires() {
        let handle = LockHandle::new("abc#0".to_string(), None, Duration::ZERO, 1);
        assert!(!handle.is_expired(Utc::now()));
        assert_eq!(handle.expires_at(), None);
    }
}
