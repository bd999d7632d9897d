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

//! In-memory document store.
//!
//! Every operation runs under one mutex, which makes `find_one_and_update`
//! atomic in the same sense a database's find-and-modify is. The store's
//! clock doubles as the server clock reported through `server_time`.

use crate::clock::{Clock, SystemClock};
use crate::error::{LockerError, Result};
use crate::store::{Document, DocumentStore, Filter, RecordId, Update, WriteConcern};
use chrono::{DateTime, Utc};
use log::trace;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

type Collections = HashMap<String, BTreeMap<RecordId, Document>>;

#[derive(Clone)]
pub struct InMemoryStore {
    collections: Arc<Mutex<Collections>>,
    clock: Arc<dyn Clock>,
    report_server_time: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
            clock,
            report_server_time: true,
        }
    }

    /// Stops reporting `server_time`, as a backend without a time command would.
    pub fn without_server_time(mut self) -> Self {
        self.report_server_time = false;
        self
    }

    fn collections(&self) -> Result<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| LockerError::Store("in-memory store poisoned".to_string()))
    }

    /// Inserts or replaces a whole document.
    pub fn insert(&self, collection: &str, id: &RecordId, document: Document) -> Result<()> {
        let mut collections = self.collections()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>> {
        let collections = self.collections()?;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    /// Replaces an existing document. Returns false when the id is unknown.
    pub fn replace(&self, collection: &str, id: &RecordId, document: Document) -> Result<bool> {
        let mut collections = self.collections()?;
        match collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
        {
            Some(existing) => {
                *existing = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, collection: &str, id: &RecordId) -> Result<bool> {
        let mut collections = self.collections()?;
        Ok(collections
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some())
    }

    pub fn len(&self, collection: &str) -> Result<usize> {
        let collections = self.collections()?;
        Ok(collections.get(collection).map_or(0, BTreeMap::len))
    }

    pub fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.len(collection)? == 0)
    }

    fn apply_updates(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        limit: Option<usize>,
    ) -> Result<(u64, Option<(RecordId, Document)>)> {
        let now = self.clock.now();
        let mut collections = self.collections()?;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok((0, None));
        };

        let mut modified = 0;
        let mut first = None;
        let mut matched = 0;
        for (id, document) in documents.iter_mut() {
            if limit.is_some_and(|limit| matched >= limit) {
                break;
            }
            if !filter.matches(id, document, now) {
                continue;
            }
            matched += 1;
            let mut changed = false;
            for update in updates {
                changed |= update.apply(document, now);
            }
            if changed {
                modified += 1;
            }
            if first.is_none() {
                first = Some((id.clone(), document.clone()));
            }
        }
        Ok((modified, first))
    }
}

fn project(document: &Document, projection: &[&str]) -> Document {
    if projection.is_empty() {
        return document.clone();
    }
    document
        .iter()
        .filter(|(field, _)| projection.contains(&field.as_str()))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

impl DocumentStore for InMemoryStore {
    fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        projection: &[&str],
        write_concern: WriteConcern,
    ) -> Result<Option<Document>> {
        let (_, first) = self.apply_updates(collection, filter, updates, Some(1))?;
        trace!(
            "find_one_and_update on {collection} ({write_concern}) matched: {}",
            first.is_some()
        );
        Ok(first.map(|(_, document)| project(&document, projection)))
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        write_concern: WriteConcern,
    ) -> Result<u64> {
        let (modified, _) = self.apply_updates(collection, filter, updates, Some(1))?;
        trace!("update_one on {collection} ({write_concern}) modified {modified}");
        Ok(modified)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &[Update],
        write_concern: WriteConcern,
    ) -> Result<u64> {
        let (modified, _) = self.apply_updates(collection, filter, updates, None)?;
        trace!("update_many on {collection} ({write_concern}) modified {modified}");
        Ok(modified)
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> Result<Option<Document>> {
        let now = self.clock.now();
        let collections = self.collections()?;
        Ok(collections.get(collection).and_then(|documents| {
            documents
                .iter()
                .find(|(id, document)| filter.matches(id, document, now))
                .map(|(_, document)| project(document, projection))
        }))
    }

    fn find_ids(&self, collection: &str, filter: &Filter) -> Result<Vec<RecordId>> {
        let now = self.clock.now();
        let collections = self.collections()?;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(id, document)| filter.matches(id, document, now))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn server_time(&self) -> Result<Option<DateTime<Utc>>> {
        if self.report_server_time {
            Ok(Some(self.clock.now()))
        } else {
            Ok(None)
        }
    }
}
