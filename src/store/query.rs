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
use crate::store::{Document, RecordId, Value};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Predicate over a single stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches the document with this id.
    Id(RecordId),
    /// Field is absent or null.
    Missing(String),
    /// Field is present and not null.
    Present(String),
    Eq(String, Value),
    /// Timestamp field is at least `age` old according to the store's clock.
    OlderThan { field: String, age: Duration },
    /// Timestamp field is less than `age` old according to the store's clock.
    NewerThan { field: String, age: Duration },
    /// Timestamp field is at or before an instant chosen by the caller.
    AtOrBefore { field: String, instant: DateTime<Utc> },
    /// Timestamp field is strictly after an instant chosen by the caller.
    After { field: String, instant: DateTime<Utc> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn id(id: &RecordId) -> Self {
        Filter::Id(id.clone())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Evaluates the filter against a document, with `now` as the store clock.
    pub fn matches(&self, id: &RecordId, document: &Document, now: DateTime<Utc>) -> bool {
        match self {
            Filter::Id(expected) => expected == id,
            Filter::Missing(field) => document.get(field).is_none_or(Value::is_null),
            Filter::Present(field) => document.get(field).is_some_and(|value| !value.is_null()),
            Filter::Eq(field, expected) => match document.get(field) {
                Some(value) => value == expected,
                None => expected.is_null(),
            },
            Filter::OlderThan { field, age } => timestamp(document, field)
                .is_some_and(|stamp| now.signed_duration_since(stamp) >= to_chrono(*age)),
            Filter::NewerThan { field, age } => timestamp(document, field)
                .is_some_and(|stamp| now.signed_duration_since(stamp) < to_chrono(*age)),
            Filter::AtOrBefore { field, instant } => {
                timestamp(document, field).is_some_and(|stamp| stamp <= *instant)
            }
            Filter::After { field, instant } => {
                timestamp(document, field).is_some_and(|stamp| stamp > *instant)
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(id, document, now)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(id, document, now)),
        }
    }
}

fn timestamp(document: &Document, field: &str) -> Option<DateTime<Utc>> {
    document.get(field).and_then(Value::as_timestamp)
}

/// Field modification applied by update operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Set(String, Value),
    /// Sets the field to the store's current time.
    CurrentDate(String),
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Update::Set(field.into(), value.into())
    }

    /// Applies the update and reports whether the document changed.
    pub fn apply(&self, document: &mut Document, now: DateTime<Utc>) -> bool {
        let (field, value) = match self {
            Update::Set(field, value) => (field, value.clone()),
            Update::CurrentDate(field) => (field, Value::Timestamp(now)),
        };
        let previous = document.insert(field.clone(), value.clone());
        previous.as_ref() != Some(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn locked_doc(holder: &str, locked_at: DateTime<Utc>) -> Document {
        let mut doc = Document::new();
        doc.insert("locking_name".into(), Value::from(holder));
        doc.insert("locked_at".into(), Value::Timestamp(locked_at));
        doc
    }

    #[test]
    fn missing_matches_absent_and_null() {
        let id = RecordId::from("1");
        let mut doc = Document::new();
        let filter = Filter::Missing("locking_name".into());
        assert!(filter.matches(&id, &doc, at(0)));
        doc.insert("locking_name".into(), Value::Null);
        assert!(filter.matches(&id, &doc, at(0)));
        doc.insert("locking_name".into(), Value::from("a#0"));
        assert!(!filter.matches(&id, &doc, at(0)));
    }

    #[test]
    fn older_than_boundary_is_inclusive() {
        let id = RecordId::from("1");
        let doc = locked_doc("a#0", at(0));
        let filter = Filter::OlderThan {
            field: "locked_at".into(),
            age: Duration::from_secs(5),
        };
        assert!(!filter.matches(&id, &doc, at(4)));
        assert!(filter.matches(&id, &doc, at(5)));

        let newer = Filter::NewerThan {
            field: "locked_at".into(),
            age: Duration::from_secs(5),
        };
        assert!(newer.matches(&id, &doc, at(4)));
        assert!(!newer.matches(&id, &doc, at(5)));
    }

    #[test]
    fn eq_against_null_matches_absent_field() {
        let id = RecordId::from("1");
        let doc = Document::new();
        assert!(Filter::Eq("locking_name".into(), Value::Null).matches(&id, &doc, at(0)));
        assert!(!Filter::Eq("locking_name".into(), Value::from("a")).matches(&id, &doc, at(0)));
    }

    #[test]
    fn current_date_update_uses_store_time() {
        let mut doc = Document::new();
        assert!(Update::CurrentDate("locked_at".into()).apply(&mut doc, at(7)));
        assert_eq!(doc.get("locked_at"), Some(&Value::Timestamp(at(7))));
        assert!(!Update::set("locked_at", at(7)).apply(&mut doc, at(9)));
    }
}
