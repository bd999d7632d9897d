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

use crate::locking::timeout::{expires_at, is_expired};
use crate::store::{Document, Value};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// The two protocol fields as stored on a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFields {
    pub holder_name: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl LockFields {
    pub fn new(holder_name: impl Into<String>, locked_at: DateTime<Utc>) -> Self {
        Self {
            holder_name: Some(holder_name.into()),
            locked_at: Some(locked_at),
        }
    }

    pub fn from_document(document: &Document, name_field: &str, at_field: &str) -> Self {
        Self {
            holder_name: document
                .get(name_field)
                .and_then(Value::as_str)
                .map(str::to_string),
            locked_at: document.get(at_field).and_then(Value::as_timestamp),
        }
    }

    pub fn state(&self, timeout: Duration, now: DateTime<Utc>) -> LockState {
        LockState::evaluate(self, timeout, now)
    }
}

/// Lock state derived from stored fields and the current time. Expiry is never
/// written anywhere; a stale lock simply evaluates to [`LockState::Expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held {
        holder_name: String,
        locked_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Expired {
        holder_name: String,
        locked_at: DateTime<Utc>,
    },
}

impl LockState {
    pub fn evaluate(fields: &LockFields, timeout: Duration, now: DateTime<Utc>) -> Self {
        let (Some(holder_name), Some(locked_at)) = (&fields.holder_name, fields.locked_at) else {
            return LockState::Unlocked;
        };

        if is_expired(locked_at, timeout, now) {
            LockState::Expired {
                holder_name: holder_name.clone(),
                locked_at,
            }
        } else {
            LockState::Held {
                holder_name: holder_name.clone(),
                locked_at,
                expires_at: expires_at(locked_at, timeout),
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Held { .. })
    }

    pub fn holder_name(&self) -> Option<&str> {
        match self {
            LockState::Unlocked => None,
            LockState::Held { holder_name, .. } | LockState::Expired { holder_name, .. } => {
                Some(holder_name)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LockState::Unlocked => "unlocked",
            LockState::Held { .. } => "held",
            LockState::Expired { .. } => "expired",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Held {
                holder_name,
                expires_at,
                ..
            } => write!(f, "held by {holder_name} until {}", expires_at.to_rfc3339()),
            LockState::Expired { holder_name, .. } => write!(f, "expired (last {holder_name})"),
            LockState::Unlocked => f.write_str("unlocked"),
        }
    }
}
