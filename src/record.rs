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

//! Host record seam.
//!
//! The locking layer never saves whole documents. It only needs identity, the
//! persisted/destroyed predicates, field access by configured name and reload.

use crate::error::Result;
use crate::locking::handle::LockHandle;
use crate::model::LockModel;
use crate::store::{RecordId, Value};
use chrono::{DateTime, Utc};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Host record-mapping collaborator.
pub trait Record {
    fn id(&self) -> &RecordId;

    /// Whether the record has been written to the store. Unpersisted records are
    /// never locked.
    fn is_persisted(&self) -> bool;

    fn is_destroyed(&self) -> bool;

    /// Reads a field by name. Unknown fields fail with the host's own error.
    fn read_attribute(&self, field: &str) -> Result<Value>;

    fn write_attribute(&mut self, field: &str, value: Value) -> Result<()>;

    /// Replaces in-memory state with the stored document.
    fn reload(&mut self) -> Result<()>;
}

/// A host record bound to its lockable type, carrying the re-entrancy state.
pub struct Lockable<R> {
    record: R,
    model: Arc<LockModel>,
    lock: Option<LockHandle>,
}

impl<R: Record> Lockable<R> {
    pub fn new(record: R, model: Arc<LockModel>) -> Self {
        Self {
            record,
            model,
            lock: None,
        }
    }

    pub fn model(&self) -> &Arc<LockModel> {
        &self.model
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Whether this in-memory object holds the lock through a running `with_lock`.
    pub fn has_lock(&self) -> bool {
        self.lock.is_some()
    }

    pub fn lock_handle(&self) -> Option<&LockHandle> {
        self.lock.as_ref()
    }

    /// In-memory value of the holder name field.
    pub fn locking_name(&self) -> Result<Option<String>> {
        let field = self.model.settings().locking_name_field;
        Ok(self
            .record
            .read_attribute(&field)?
            .as_str()
            .map(str::to_string))
    }

    /// In-memory value of the lock timestamp field.
    pub fn locked_at(&self) -> Result<Option<DateTime<Utc>>> {
        let field = self.model.settings().locked_at_field;
        Ok(self.record.read_attribute(&field)?.as_timestamp())
    }

    pub fn into_inner(self) -> R {
        self.record
    }

    pub(crate) fn set_lock(&mut self, handle: LockHandle) {
        self.lock = Some(handle);
    }

    pub(crate) fn take_lock(&mut self) -> Option<LockHandle> {
        self.lock.take()
    }
}

impl<R> Deref for Lockable<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

impl<R> DerefMut for Lockable<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.record
    }
}
