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

//! Record store collaborator.
//!
//! The locking protocol only needs a narrow slice of a document database: an
//! atomic find-and-update, an update reporting its modified count, point reads
//! with projection, and optionally the server's notion of "now". [`DocumentStore`]
//! captures that slice. Queries are expressed with the small typed [`Filter`] and
//! [`Update`] languages so that backends can translate them into their native
//! query syntax.

pub mod memory;
mod query;

pub use memory::InMemoryStore;
pub use query::{Filter, Update};

use crate::error::{LockerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single field value as seen by the locking protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Field map of a stored document, keyed by field name.
pub type Document = BTreeMap<String, Value>;

/// How many members of the store must acknowledge a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Unacknowledged,
    Nodes(u32),
    Majority,
}

/// Durability requested for lock writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteConcern {
    pub w: Acknowledgement,
    pub journal: bool,
}

impl WriteConcern {
    pub const fn acknowledged(nodes: u32) -> Self {
        Self {
            w: Acknowledgement::Nodes(nodes),
            journal: false,
        }
    }

    pub const fn majority() -> Self {
        Self {
            w: Acknowledgement::Majority,
            journal: false,
        }
    }

    pub const fn unacknowledged() -> Self {
        Self {
            w: Acknowledgement::Unacknowledged,
            journal: false,
        }
    }

    pub fn with_journal(mut self, journal: bool) -> Self {
        self.journal = journal;
        self
    }

    /// Whether the store confirms the write before returning.
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self.w, Acknowledgement::Unacknowledged | Acknowledgement::Nodes(0))
    }
}

impl Default for WriteConcern {
    fn default() -> Self {
        Self::acknowledged(1)
    }
}

impl fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.w {
            Acknowledgement::Unacknowledged => f.write_str("w: 0")?,
            Acknowledgement::Nodes(nodes) => write!(f, "w: {nodes}")?,
            Acknowledgement::Majority => f.write_str("w: majority")?,
        }
        if self.journal {
            f.write_str(", j: true")?;
        }
        Ok(())
    }
}

impl FromStr for WriteConcern {
    type Err = LockerError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("majority") {
            return Ok(Self::majority());
        }
        match trimmed.parse::<u32>() {
            Ok(0) => Ok(Self::unacknowledged()),
            Ok(nodes) => Ok(Self::acknowledged(nodes)),
            Err(_) => Err(LockerError::InvalidParameterValue {
                parameter: "locker_write_concern".to_string(),
                details: format!("'{trimmed}' is not a node count or the word 'majority'"),
            }),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWriteConcern {
    Nodes(u32),
    Tag(String),
}

impl<'de> Deserialize<'de> for WriteConcern {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawWriteConcern::deserialize(deserializer)? {
            RawWriteConcern::Nodes(0) => Ok(Self::unacknowledged()),
            RawWriteConcern::Nodes(nodes) => Ok(Self::acknowledged(nodes)),
            RawWriteConcern::Tag(tag) => tag.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Narrow interface onto the document database holding lockable records.
///
/// Every method is a single round trip. Implementations must apply
/// `find_one_and_update` atomically: matching and updating may not be split
/// into a separate read and write.
pub trait DocumentStore: Send + Sync {
    /// Atomically matches one document and applies `updates` to it, returning
    /// the post-update document restricted to `projection`.
    fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        projection: &[&str],
        write_concern: WriteConcern,
    ) -> Result<Option<Document>>;

    /// Applies `updates` to the first matching document and returns the number
    /// of documents modified (0 or 1).
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        write_concern: WriteConcern,
    ) -> Result<u64>;

    /// Applies `updates` to every matching document.
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        write_concern: WriteConcern,
    ) -> Result<u64>;

    /// Reads the first matching document restricted to `projection`.
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> Result<Option<Document>>;

    /// Ids of every matching document, in id order.
    fn find_ids(&self, collection: &str, filter: &Filter) -> Result<Vec<RecordId>>;

    /// The server's current time, when the backend can report it.
    fn server_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_concern_parses_counts_and_majority() {
        assert_eq!("1".parse::<WriteConcern>().unwrap(), WriteConcern::acknowledged(1));
        assert_eq!("0".parse::<WriteConcern>().unwrap(), WriteConcern::unacknowledged());
        assert_eq!(
            "Majority".parse::<WriteConcern>().unwrap(),
            WriteConcern::majority()
        );
        assert!("some".parse::<WriteConcern>().is_err());
    }

    #[test]
    fn write_concern_display() {
        assert_eq!(WriteConcern::default().to_string(), "w: 1");
        assert_eq!(
            WriteConcern::majority().with_journal(true).to_string(),
            "w: majority, j: true"
        );
        assert!(!WriteConcern::unacknowledged().is_acknowledged());
        assert!(WriteConcern::majority().is_acknowledged());
    }

    #[test]
    fn optional_values_become_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x#0")), Value::String("x#0".to_string()));
    }
}
