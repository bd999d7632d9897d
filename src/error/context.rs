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

use crate::config::PARAMETER_NAMES;
use crate::error::LockerError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a LockerError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a LockerError) -> Self {
        let (suggestion, details) = match error {
            LockerError::LockNotAcquired { model, id } => {
                let suggestion = Some(
                    "Another holder still owns the lease. Pass a larger 'retries' value, raise \
                     'maximum_backoff', or wait for the lock timeout to elapse."
                        .to_string(),
                );
                let details = Some(format!("Lock on {model} '{id}' is held by another attempt"));
                (suggestion, details)
            }
            LockerError::InvalidParameter { parameter, .. } => {
                let suggestion = Some(format!(
                    "Accepted parameters are: {}.",
                    PARAMETER_NAMES.join(", ")
                ));
                let details = Some(format!("Unrecognized parameter: {parameter}"));
                (suggestion, details)
            }
            LockerError::InvalidParameterValue { parameter, .. } => {
                let suggestion = match parameter.as_str() {
                    "backoff_algorithm" => Some(
                        "Use 'exponential_backoff' or 'locked_at_backoff', or install a custom \
                         function programmatically."
                            .to_string(),
                    ),
                    "locking_name_generator" => Some(
                        "Use 'secure_locking_name', or install a custom function \
                         programmatically."
                            .to_string(),
                    ),
                    "locker_write_concern" => {
                        Some("Use a node count such as '1' or the word 'majority'.".to_string())
                    }
                    _ => Some("Durations are given in seconds, e.g. '5' or '2.5'.".to_string()),
                };
                (suggestion, None)
            }
            LockerError::UnknownAttribute { model, attribute } => {
                let suggestion = Some(format!(
                    "Declare a '{attribute}' field on {model} or point 'locking_name_field' / \
                     'locked_at_field' at existing fields."
                ));
                (suggestion, None)
            }
            LockerError::RecordNotFound { .. } => {
                let suggestion = Some(
                    "The record was removed from the store while it was being locked."
                        .to_string(),
                );
                (suggestion, None)
            }
            LockerError::Store(msg) => {
                let details = Some(format!("Store operation failed: {msg}"));
                (None, details)
            }
            LockerError::Config(_) => {
                let suggestion = Some(
                    "Check the locker settings file and DOCLOCK_* environment variables."
                        .to_string(),
                );
                (suggestion, None)
            }
            LockerError::Host(_) => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
