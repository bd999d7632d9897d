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

use crate::clock::to_chrono;
use crate::error::{LockerError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Converts a number of seconds from configuration into a duration.
pub fn seconds(parameter: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid_value(parameter, &value.to_string()));
    }
    Duration::try_from_secs_f64(value).map_err(|_| invalid_value(parameter, &value.to_string()))
}

/// Parses a seconds value originating from a settings file, environment, or string-keyed
/// configuration. Accepts integers and fractions, e.g. `5` or `2.5`.
pub fn parse_seconds(parameter: &str, value: &str) -> Result<Duration> {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(parsed) => seconds(parameter, parsed),
        Err(_) => Err(invalid_value(parameter, trimmed)),
    }
}

fn invalid_value(parameter: &str, value: &str) -> LockerError {
    LockerError::InvalidParameterValue {
        parameter: parameter.to_string(),
        details: format!("'{value}' is invalid. Use a non-negative number of seconds."),
    }
}

/// Instant at which a lock taken at `locked_at` stops being held.
pub fn expires_at(locked_at: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    locked_at
        .checked_add_signed(to_chrono(timeout))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A lock is expired once `now - locked_at >= timeout`; the boundary counts as expired.
pub fn is_expired(locked_at: DateTime<Utc>, timeout: Duration, now: DateTime<Utc>) -> bool {
    now >= expires_at(locked_at, timeout)
}

/// Latest `locked_at` that is already expired at `now`.
pub fn expiry_cutoff(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(to_chrono(timeout))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
