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

mod context;

pub use context::ErrorContext;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockerError {
    #[error("{model} with id '{id}' could not acquire lock")]
    LockNotAcquired { model: String, id: String },

    #[error("{model} does not accept locker parameter '{parameter}'")]
    InvalidParameter { model: String, parameter: String },

    #[error("Invalid value for locker parameter '{parameter}': {details}")]
    InvalidParameterValue { parameter: String, details: String },

    #[error("Unknown attribute '{attribute}' for {model}")]
    UnknownAttribute { model: String, attribute: String },

    #[error("{model} with id '{id}' was not found")]
    RecordNotFound { model: String, id: String },

    #[error("Document store error: {0}")]
    Store(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Host(Box<dyn std::error::Error + Send + Sync>),
}

impl LockerError {
    pub fn lock_not_acquired(model: impl Into<String>, id: impl ToString) -> Self {
        LockerError::LockNotAcquired {
            model: model.into(),
            id: id.to_string(),
        }
    }

    pub fn unknown_attribute(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        LockerError::UnknownAttribute {
            model: model.into(),
            attribute: attribute.into(),
        }
    }

    /// Wraps an error raised by a host record implementation without altering it.
    pub fn host<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LockerError::Host(Box::new(err))
    }

    pub fn is_lock_not_acquired(&self) -> bool {
        matches!(self, LockerError::LockNotAcquired { .. })
    }
}

pub type Result<T> = std::result::Result<T, LockerError>;
