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

/// Shared `Account` host record backed by the in-memory store
use chrono::{DateTime, Utc};
use doclock::clock::Clock;
use doclock::error::{LockerError, Result};
use doclock::record::Record;
use doclock::store::{Document, InMemoryStore, RecordId, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub const ACCOUNTS: &str = "accounts";

const DEFAULT_FIELDS: [&str; 4] = ["name", "balance", "locking_name", "locked_at"];

/// Host record with a declared field schema; unknown fields fail the way an
/// object-document mapper reports them.
#[derive(Clone)]
pub struct Account {
    store: InMemoryStore,
    id: RecordId,
    fields: HashSet<String>,
    document: Document,
    persisted: bool,
    destroyed: bool,
}

#[allow(dead_code)]
impl Account {
    pub fn new(store: &InMemoryStore, id: &str) -> Self {
        Self::with_fields(store, id, &DEFAULT_FIELDS)
    }

    pub fn with_fields(store: &InMemoryStore, id: &str, fields: &[&str]) -> Self {
        Self {
            store: store.clone(),
            id: RecordId::from(id),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            document: Document::new(),
            persisted: false,
            destroyed: false,
        }
    }

    pub fn create(store: &InMemoryStore, id: &str) -> Self {
        let mut account = Self::new(store, id);
        account.save();
        account
    }

    /// Loads a stored account, as a second process would.
    pub fn find(store: &InMemoryStore, id: &str) -> Self {
        let mut account = Self::new(store, id);
        account.reload().unwrap();
        account.persisted = true;
        account
    }

    pub fn save(&mut self) {
        if self.persisted {
            self.store
                .replace(ACCOUNTS, &self.id, self.document.clone())
                .unwrap();
        } else {
            self.store
                .insert(ACCOUNTS, &self.id, self.document.clone())
                .unwrap();
            self.persisted = true;
        }
    }

    pub fn destroy(&mut self) {
        self.store.remove(ACCOUNTS, &self.id).unwrap();
        self.destroyed = true;
    }

    pub fn balance(&self) -> i64 {
        match self.document.get("balance") {
            Some(Value::Int(balance)) => *balance,
            _ => 0,
        }
    }

    pub fn set_balance(&mut self, balance: i64) {
        self.document
            .insert("balance".to_string(), Value::Int(balance));
    }
}

impl Record for Account {
    fn id(&self) -> &RecordId {
        &self.id
    }

    fn is_persisted(&self) -> bool {
        self.persisted && !self.destroyed
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn read_attribute(&self, field: &str) -> Result<Value> {
        if !self.fields.contains(field) {
            return Err(LockerError::unknown_attribute("Account", field));
        }
        Ok(self.document.get(field).cloned().unwrap_or(Value::Null))
    }

    fn write_attribute(&mut self, field: &str, value: Value) -> Result<()> {
        if !self.fields.contains(field) {
            return Err(LockerError::unknown_attribute("Account", field));
        }
        self.document.insert(field.to_string(), value);
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        match self.store.get(ACCOUNTS, &self.id)? {
            Some(document) => {
                self.document = document;
                Ok(())
            }
            None => Err(LockerError::RecordNotFound {
                model: "Account".to_string(),
                id: self.id.to_string(),
            }),
        }
    }
}

/// In-memory store reporting time from `clock`.
#[allow(dead_code)]
pub fn store_at(clock: Arc<dyn Clock>) -> InMemoryStore {
    InMemoryStore::with_clock(clock)
}

/// Writes lock fields straight into the stored document, simulating another
/// process holding the lock.
#[allow(dead_code)]
pub fn write_lock_fields(
    store: &InMemoryStore,
    id: &str,
    holder_name: &str,
    locked_at: DateTime<Utc>,
) {
    let id = RecordId::from(id);
    let mut document = store.get(ACCOUNTS, &id).unwrap().unwrap_or_default();
    document.insert("locking_name".to_string(), Value::from(holder_name));
    document.insert("locked_at".to_string(), Value::Timestamp(locked_at));
    store.replace(ACCOUNTS, &id, document).unwrap();
}

/// Stored `(locking_name, locked_at)` of an account.
#[allow(dead_code)]
pub fn lock_fields(store: &InMemoryStore, id: &str) -> (Value, Value) {
    let document = store
        .get(ACCOUNTS, &RecordId::from(id))
        .unwrap()
        .unwrap_or_default();
    (
        document.get("locking_name").cloned().unwrap_or(Value::Null),
        document.get("locked_at").cloned().unwrap_or(Value::Null),
    )
}
