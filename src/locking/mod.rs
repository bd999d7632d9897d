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

pub mod acquisition;
pub mod adapter;
pub mod controller;
pub mod handle;
pub mod scoped_guard;
pub mod state;
pub mod strategy;
pub mod timeout;
pub mod wait_observer;

pub use acquisition::{LockAttempt, LockOptions, Retries};
pub use adapter::{DocumentLockAdapter, LockAdapter, LockTarget, ModelTarget, TimeSource};
pub use controller::LockCoordinator;
pub use handle::LockHandle;
pub use scoped_guard::ReleaseGuard;
pub use state::{LockFields, LockState};
pub use strategy::{
    BackoffAlgorithm, BackoffContext, NamingContext, NamingStrategy, exponential_backoff,
    locked_at_backoff, secure_locking_name,
};
pub use timeout::{expires_at, is_expired, parse_seconds};
pub use wait_observer::{LockWaitObserver, NoopLockWaitObserver, ReleaseSkip};
