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

//! Lease-based record locking over a shared document store.
//!
//! Processes serialize work on a record by writing a holder name and a
//! timestamp onto the record itself through one atomic conditional update. A
//! lock nobody releases expires after the record type's `lock_timeout`.
//!
//! ```
//! use doclock::locking::LockCoordinator;
//! use doclock::model::LockModel;
//! use doclock::store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let store = InMemoryStore::new();
//! let coordinator = LockCoordinator::for_store(Arc::new(store.clone())).unwrap();
//! let accounts = LockModel::register("Account", "accounts");
//! assert!(coordinator.locked(&accounts).unwrap().is_empty());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod locking;
pub mod logging;
pub mod model;
pub mod record;
pub mod store;
#[cfg(test)]
pub mod test;

pub use error::{LockerError, Result};
pub use locking::{LockCoordinator, LockOptions, Retries};
pub use model::LockModel;
pub use record::{Lockable, Record};
