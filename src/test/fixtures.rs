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

/// Shared host record used by unit tests of the locking layer
use crate::error::{LockerError, Result};
use crate::record::Record;
use crate::store::{Document, InMemoryStore, RecordId, Value};
use std::collections::HashSet;

/// Minimal host record over [`InMemoryStore`] with a declared field schema.
pub struct StoredRecord {
    store: InMemoryStore,
    model: String,
    collection: String,
    id: RecordId,
    fields: HashSet<String>,
    document: Document,
    persisted: bool,
    destroyed: bool,
}

impl StoredRecord {
    /// Creates an unsaved record declaring `fields` plus the default lock fields.
    pub fn new(store: &InMemoryStore, model: &str, collection: &str, id: &str) -> Self {
        Self::with_fields(
            store,
            model,
            collection,
            id,
            &["name", "balance", "locking_name", "locked_at"],
        )
    }

    pub fn with_fields(
        store: &InMemoryStore,
        model: &str,
        collection: &str,
        id: &str,
        fields: &[&str],
    ) -> Self {
        Self {
            store: store.clone(),
            model: model.to_string(),
            collection: collection.to_string(),
            id: RecordId::from(id),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            document: Document::new(),
            persisted: false,
            destroyed: false,
        }
    }

    /// Creates and saves a record.
    pub fn create(store: &InMemoryStore, model: &str, collection: &str, id: &str) -> Self {
        let mut record = Self::new(store, model, collection, id);
        record.save();
        record
    }

    pub fn save(&mut self) {
        self.store
            .insert(&self.collection, &self.id, self.document.clone())
            .unwrap();
        self.persisted = true;
    }

    pub fn destroy(&mut self) {
        self.store.remove(&self.collection, &self.id).unwrap();
        self.destroyed = true;
    }
}

impl Record for StoredRecord {
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
            return Err(LockerError::unknown_attribute(&self.model, field));
        }
        Ok(self.document.get(field).cloned().unwrap_or(Value::Null))
    }

    fn write_attribute(&mut self, field: &str, value: Value) -> Result<()> {
        if !self.fields.contains(field) {
            return Err(LockerError::unknown_attribute(&self.model, field));
        }
        self.document.insert(field.to_string(), value);
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        match self.store.get(&self.collection, &self.id)? {
            Some(document) => {
                self.document = document;
                Ok(())
            }
            None => Err(LockerError::RecordNotFound {
                model: self.model.clone(),
                id: self.id.to_string(),
            }),
        }
    }
}
