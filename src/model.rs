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

//! Lockable record types.
//!
//! A [`LockModel`] carries the locker settings of one record type. Registration
//! snapshots the global settings; per-type overrides are tracked so that
//! [`LockModel::refresh_from_global`] never clobbers them.

use crate::config::{
    self, LockerSettings, PARAMETER_NAMES, Parameter, SettingSource, SettingValue,
};
use crate::error::{LockerError, Result};
use crate::locking::adapter::ModelTarget;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
pub struct LockModel {
    name: String,
    collection: String,
    state: RwLock<ModelState>,
}

#[derive(Debug, Clone)]
struct ModelState {
    settings: LockerSettings,
    overrides: HashSet<Parameter>,
}

impl LockModel {
    /// Registers a record type with the locking capability, seeded from the
    /// current global settings.
    pub fn register(name: impl Into<String>, collection: impl Into<String>) -> Arc<Self> {
        Self::with_settings(name, collection, config::global_settings())
    }

    /// Registers a record type with explicit settings. Parameters that differ from
    /// the current global settings count as overrides.
    pub fn with_settings(
        name: impl Into<String>,
        collection: impl Into<String>,
        settings: LockerSettings,
    ) -> Arc<Self> {
        let global = config::global_settings();
        let overrides = Parameter::ALL
            .into_iter()
            .filter(|parameter| settings.differs(&global, *parameter))
            .collect();
        let model = Self {
            name: name.into(),
            collection: collection.into(),
            state: RwLock::new(ModelState {
                settings,
                overrides,
            }),
        };
        debug!("Registered lockable type {} ({})", model.name, model.collection);
        Arc::new(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn read(&self) -> RwLockReadGuard<'_, ModelState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModelState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the resolved settings for this type.
    pub fn settings(&self) -> LockerSettings {
        self.read().settings.clone()
    }

    pub fn target(&self) -> ModelTarget {
        ModelTarget::new(&self.name, &self.collection, &self.read().settings)
    }

    /// Applies string-keyed parameters. Every key is checked before any value is
    /// applied, and a rejected value leaves the type unchanged.
    ///
    /// ```
    /// # use doclock::model::LockModel;
    /// let accounts = LockModel::register("Account", "accounts");
    /// accounts
    ///     .locker([("lock_timeout", "3"), ("backoff_algorithm", "locked_at_backoff")])
    ///     .unwrap();
    /// assert!(accounts.locker([("lock_timeuot", "3")]).is_err());
    /// ```
    pub fn locker<I, K, V>(&self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SettingValue>,
    {
        let mut resolved = Vec::new();
        for (key, value) in params {
            let key = key.as_ref();
            let parameter =
                Parameter::from_name(key).ok_or_else(|| LockerError::InvalidParameter {
                    model: self.name.clone(),
                    parameter: key.to_string(),
                })?;
            resolved.push((parameter, value.into()));
        }

        let mut state = self.write();
        let mut settings = state.settings.clone();
        for (parameter, value) in &resolved {
            settings.apply(*parameter, value.clone())?;
        }
        state.settings = settings;
        state
            .overrides
            .extend(resolved.iter().map(|(parameter, _)| *parameter));
        debug!(
            "Configured {} locker parameters: {}",
            self.name,
            resolved
                .iter()
                .map(|(parameter, _)| parameter.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// Sets one parameter on this type.
    pub fn set(&self, parameter: Parameter, value: impl Into<SettingValue>) -> Result<()> {
        let mut state = self.write();
        state.settings.apply(parameter, value.into())?;
        state.overrides.insert(parameter);
        Ok(())
    }

    /// Mutates the settings directly. Parameters changed by `update` become
    /// overrides.
    pub fn update<F>(&self, update: F)
    where
        F: FnOnce(&mut LockerSettings),
    {
        let mut state = self.write();
        let before = state.settings.clone();
        update(&mut state.settings);
        let changed: Vec<Parameter> = Parameter::ALL
            .into_iter()
            .filter(|parameter| state.settings.differs(&before, *parameter))
            .collect();
        state.overrides.extend(changed);
    }

    /// Re-reads the current global value of every parameter this type does not
    /// override.
    pub fn refresh_from_global(&self) {
        let global = config::global_settings();
        let mut state = self.write();
        let ModelState {
            settings,
            overrides,
        } = &mut *state;
        for parameter in Parameter::ALL {
            if !overrides.contains(&parameter) {
                settings.copy_from(&global, parameter);
            }
        }
    }

    /// Drops every override and re-seeds from the global settings.
    pub fn reset(&self) {
        let mut state = self.write();
        state.settings = config::global_settings();
        state.overrides.clear();
    }

    pub fn is_overridden(&self, parameter: Parameter) -> bool {
        self.read().overrides.contains(&parameter)
    }

    /// Tier the current value of `parameter` resolves from.
    pub fn source_of(&self, parameter: Parameter) -> SettingSource {
        let state = self.read();
        if state.overrides.contains(&parameter) {
            SettingSource::Model
        } else if state
            .settings
            .differs(&LockerSettings::default(), parameter)
        {
            SettingSource::Global
        } else {
            SettingSource::Default
        }
    }

    /// Parameter names accepted by [`LockModel::locker`].
    pub fn accepted_parameters() -> &'static [&'static str] {
        &PARAMETER_NAMES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::strategy::BackoffAlgorithm;
    use crate::store::WriteConcern;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    #[serial]
    fn test_register_snapshots_global_settings() {
        config::reset();
        config::configure(|settings| settings.lock_timeout = Duration::from_secs(8));
        let model = LockModel::register("Account", "accounts");
        config::configure(|settings| settings.lock_timeout = Duration::from_secs(20));

        assert_eq!(model.settings().lock_timeout, Duration::from_secs(8));
        assert_eq!(model.source_of(Parameter::LockTimeout), SettingSource::Global);
        assert_eq!(
            model.source_of(Parameter::MaximumBackoff),
            SettingSource::Default
        );
        config::reset();
    }

    #[test]
    #[serial]
    fn test_locker_applies_parameters() {
        config::reset();
        let model = LockModel::register("Account", "accounts");
        model
            .locker([
                ("locking_name_field", SettingValue::from("locker_locking_name")),
                ("locked_at_field", SettingValue::from("locker_locked_at")),
                ("lock_timeout", SettingValue::from(3u64)),
                ("locker_write_concern", SettingValue::from(WriteConcern::majority())),
                ("maximum_backoff", SettingValue::from(30.0)),
                ("backoff_algorithm", SettingValue::from("locked_at_backoff")),
            ])
            .unwrap();

        let settings = model.settings();
        assert_eq!(settings.locking_name_field, "locker_locking_name");
        assert_eq!(settings.locked_at_field, "locker_locked_at");
        assert_eq!(settings.lock_timeout, Duration::from_secs(3));
        assert_eq!(settings.locker_write_concern, WriteConcern::majority());
        assert_eq!(settings.maximum_backoff, Duration::from_secs(30));
        assert_eq!(settings.backoff_algorithm, BackoffAlgorithm::LockedAt);
        assert_eq!(model.source_of(Parameter::LockTimeout), SettingSource::Model);

        let target = model.target();
        assert_eq!(target.locking_name_field, "locker_locking_name");
        assert_eq!(target.write_concern, WriteConcern::majority());
    }

    #[test]
    #[serial]
    fn test_locker_rejects_unknown_parameter_without_changes() {
        config::reset();
        let model = LockModel::register("Account", "accounts");
        let err = model
            .locker([("lock_timeout", "3"), ("lock_timout", "4")])
            .unwrap_err();

        match err {
            LockerError::InvalidParameter { model, parameter } => {
                assert_eq!(model, "Account");
                assert_eq!(parameter, "lock_timout");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(model.settings(), LockerSettings::default());
        assert!(!model.is_overridden(Parameter::LockTimeout));
    }

    #[test]
    #[serial]
    fn test_locker_rejects_bad_value_without_changes() {
        config::reset();
        let model = LockModel::register("Account", "accounts");
        let err = model
            .locker([("lock_timeout", "3"), ("maximum_backoff", "-1")])
            .unwrap_err();

        assert!(matches!(err, LockerError::InvalidParameterValue { .. }));
        assert_eq!(model.settings(), LockerSettings::default());
    }

    #[test]
    #[serial]
    fn test_refresh_keeps_overrides() {
        config::reset();
        let model = LockModel::register("Account", "accounts");
        model.set(Parameter::LockTimeout, 2u64).unwrap();
        config::configure(|settings| {
            settings.lock_timeout = Duration::from_secs(30);
            settings.maximum_backoff = Duration::from_secs(90);
        });

        model.refresh_from_global();
        let settings = model.settings();
        assert_eq!(settings.lock_timeout, Duration::from_secs(2));
        assert_eq!(settings.maximum_backoff, Duration::from_secs(90));

        model.reset();
        assert_eq!(model.settings().lock_timeout, Duration::from_secs(30));
        assert_eq!(model.source_of(Parameter::LockTimeout), SettingSource::Global);
        config::reset();
    }

    #[test]
    #[serial]
    fn test_update_marks_changed_parameters() {
        config::reset();
        let model = LockModel::register("Account", "accounts");
        model.update(|settings| settings.locked_at_field = "held_since".to_string());

        assert!(model.is_overridden(Parameter::LockedAtField));
        assert!(!model.is_overridden(Parameter::LockingNameField));
    }
}
