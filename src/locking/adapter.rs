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

//! Atomic store adapter.
//!
//! Every lock state change goes through a single conditional update so that two
//! processes can never both observe a successful acquisition. Reads issued here
//! (`current_lock_expiry`, `lock_fields`) only inform sleeping and reporting;
//! they never decide who holds a lock.

use crate::clock::Clock;
use crate::config::LockerSettings;
use crate::error::Result;
use crate::locking::state::LockFields;
use crate::locking::timeout::{expires_at, expiry_cutoff};
use crate::store::{DocumentStore, Filter, RecordId, Update, Value, WriteConcern};
use chrono::{DateTime, Utc};
use log::trace;
use std::sync::Arc;
use std::time::Duration;

/// Collection-level addressing for a lockable record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    pub model: String,
    pub collection: String,
    pub locking_name_field: String,
    pub locked_at_field: String,
    pub write_concern: WriteConcern,
}

impl ModelTarget {
    pub fn new(model: &str, collection: &str, settings: &LockerSettings) -> Self {
        Self {
            model: model.to_string(),
            collection: collection.to_string(),
            locking_name_field: settings.locking_name_field.clone(),
            locked_at_field: settings.locked_at_field.clone(),
            write_concern: settings.locker_write_concern,
        }
    }

    pub fn record(self, id: RecordId) -> LockTarget {
        LockTarget { model: self, id }
    }
}

/// A single record addressed for locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTarget {
    pub model: ModelTarget,
    pub id: RecordId,
}

impl LockTarget {
    pub fn model_name(&self) -> &str {
        &self.model.model
    }
}

pub trait LockAdapter: Send + Sync {
    /// Takes the lock when the record is unlocked or its lock is at least `timeout`
    /// old. Returns the stored lock fields on success, `None` when someone else
    /// holds a live lock or the record no longer exists.
    fn conditional_acquire(
        &self,
        target: &LockTarget,
        holder_name: &str,
        timeout: Duration,
    ) -> Result<Option<LockFields>>;

    /// Clears the lock fields only while `holder_name` still owns them.
    fn conditional_release(&self, target: &LockTarget, holder_name: &str) -> Result<bool>;

    /// Stored `locked_at + timeout`, or `None` when the record is not locked.
    fn current_lock_expiry(
        &self,
        target: &LockTarget,
        timeout: Duration,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Stored lock fields, or `None` when the record does not exist.
    fn lock_fields(&self, target: &LockTarget) -> Result<Option<LockFields>>;

    /// Ids of records holding a live lock.
    fn locked_ids(&self, model: &ModelTarget, timeout: Duration) -> Result<Vec<RecordId>>;

    /// Ids of records without a live lock, stale locks included.
    fn unlocked_ids(&self, model: &ModelTarget, timeout: Duration) -> Result<Vec<RecordId>>;

    /// Clears lock fields on every record of the collection.
    fn unlock_all(&self, model: &ModelTarget) -> Result<u64>;

    /// Time used for expiry comparisons.
    fn now(&self) -> Result<DateTime<Utc>>;
}

/// Where "now" comes from when matching and stamping locks.
#[derive(Clone)]
pub enum TimeSource {
    /// The store evaluates age predicates and stamps `locked_at` with its own clock.
    Server,
    /// The caller's clock is read once per operation and used for both sides.
    Caller(Arc<dyn Clock>),
}

/// [`LockAdapter`] issuing conditional updates against a [`DocumentStore`].
pub struct DocumentLockAdapter {
    store: Arc<dyn DocumentStore>,
    time_source: TimeSource,
}

impl DocumentLockAdapter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            time_source: TimeSource::Server,
        }
    }

    pub fn with_caller_clock(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            time_source: TimeSource::Caller(clock),
        }
    }

    /// Uses server time when the store reports it, otherwise the caller's clock.
    pub fn detect(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        if store.server_time()?.is_some() {
            Ok(Self::new(store))
        } else {
            Ok(Self::with_caller_clock(store, clock))
        }
    }

    pub fn time_source(&self) -> &TimeSource {
        &self.time_source
    }

    fn stale_filter(&self, field: &str, timeout: Duration) -> Filter {
        match &self.time_source {
            TimeSource::Server => Filter::OlderThan {
                field: field.to_string(),
                age: timeout,
            },
            TimeSource::Caller(clock) => Filter::AtOrBefore {
                field: field.to_string(),
                instant: expiry_cutoff(clock.now(), timeout),
            },
        }
    }

    fn live_filter(&self, field: &str, timeout: Duration) -> Filter {
        match &self.time_source {
            TimeSource::Server => Filter::NewerThan {
                field: field.to_string(),
                age: timeout,
            },
            TimeSource::Caller(clock) => Filter::After {
                field: field.to_string(),
                instant: expiry_cutoff(clock.now(), timeout),
            },
        }
    }

    fn unlocked_filter(&self, model: &ModelTarget, timeout: Duration) -> Filter {
        Filter::or([
            Filter::Missing(model.locking_name_field.clone()),
            Filter::Missing(model.locked_at_field.clone()),
            self.stale_filter(&model.locked_at_field, timeout),
        ])
    }

    fn locked_filter(&self, model: &ModelTarget, timeout: Duration) -> Filter {
        Filter::and([
            Filter::Present(model.locking_name_field.clone()),
            Filter::Present(model.locked_at_field.clone()),
            self.live_filter(&model.locked_at_field, timeout),
        ])
    }

    fn clear_updates(model: &ModelTarget) -> [Update; 2] {
        [
            Update::set(model.locking_name_field.clone(), Value::Null),
            Update::set(model.locked_at_field.clone(), Value::Null),
        ]
    }
}

impl LockAdapter for DocumentLockAdapter {
    fn conditional_acquire(
        &self,
        target: &LockTarget,
        holder_name: &str,
        timeout: Duration,
    ) -> Result<Option<LockFields>> {
        let model = &target.model;
        let (filter, stamp) = match &self.time_source {
            TimeSource::Server => (
                self.unlocked_filter(model, timeout),
                Update::CurrentDate(model.locked_at_field.clone()),
            ),
            TimeSource::Caller(clock) => {
                let now = clock.now();
                let filter = Filter::or([
                    Filter::Missing(model.locking_name_field.clone()),
                    Filter::Missing(model.locked_at_field.clone()),
                    Filter::AtOrBefore {
                        field: model.locked_at_field.clone(),
                        instant: expiry_cutoff(now, timeout),
                    },
                ]);
                (filter, Update::set(model.locked_at_field.clone(), now))
            }
        };
        let filter = Filter::and([Filter::id(&target.id), filter]);
        let updates = [
            Update::set(model.locking_name_field.clone(), holder_name),
            stamp,
        ];
        let projection = [
            model.locking_name_field.as_str(),
            model.locked_at_field.as_str(),
        ];

        let document = self.store.find_one_and_update(
            &model.collection,
            &filter,
            &updates,
            &projection,
            model.write_concern,
        )?;
        trace!(
            "Conditional acquire of {} '{}' as {holder_name}: {}",
            model.model,
            target.id,
            if document.is_some() { "matched" } else { "busy" }
        );

        Ok(document.map(|doc| {
            LockFields::from_document(&doc, &model.locking_name_field, &model.locked_at_field)
        }))
    }

    fn conditional_release(&self, target: &LockTarget, holder_name: &str) -> Result<bool> {
        let model = &target.model;
        let filter = Filter::and([
            Filter::id(&target.id),
            Filter::Eq(model.locking_name_field.clone(), Value::from(holder_name)),
        ]);
        let modified = self.store.update_one(
            &model.collection,
            &filter,
            &Self::clear_updates(model),
            model.write_concern,
        )?;
        Ok(modified == 1)
    }

    fn current_lock_expiry(
        &self,
        target: &LockTarget,
        timeout: Duration,
    ) -> Result<Option<DateTime<Utc>>> {
        let model = &target.model;
        let document = self.store.find_one(
            &model.collection,
            &Filter::id(&target.id),
            &[model.locked_at_field.as_str()],
        )?;
        Ok(document
            .and_then(|doc| doc.get(&model.locked_at_field).and_then(Value::as_timestamp))
            .map(|locked_at| expires_at(locked_at, timeout)))
    }

    fn lock_fields(&self, target: &LockTarget) -> Result<Option<LockFields>> {
        let model = &target.model;
        let document = self.store.find_one(
            &model.collection,
            &Filter::id(&target.id),
            &[
                model.locking_name_field.as_str(),
                model.locked_at_field.as_str(),
            ],
        )?;
        Ok(document.map(|doc| {
            LockFields::from_document(&doc, &model.locking_name_field, &model.locked_at_field)
        }))
    }

    fn locked_ids(&self, model: &ModelTarget, timeout: Duration) -> Result<Vec<RecordId>> {
        self.store
            .find_ids(&model.collection, &self.locked_filter(model, timeout))
    }

    fn unlocked_ids(&self, model: &ModelTarget, timeout: Duration) -> Result<Vec<RecordId>> {
        self.store
            .find_ids(&model.collection, &self.unlocked_filter(model, timeout))
    }

    fn unlock_all(&self, model: &ModelTarget) -> Result<u64> {
        let filter = Filter::or([
            Filter::Present(model.locking_name_field.clone()),
            Filter::Present(model.locked_at_field.clone()),
        ]);
        self.store.update_many(
            &model.collection,
            &filter,
            &Self::clear_updates(model),
            model.write_concern,
        )
    }

    fn now(&self) -> Result<DateTime<Utc>> {
        match &self.time_source {
            TimeSource::Server => Ok(self.store.server_time()?.unwrap_or_else(Utc::now)),
            TimeSource::Caller(clock) => Ok(clock.now()),
        }
    }
}
