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

//! Locker settings and their three-tier resolution.
//!
//! Built-in defaults seed the process-wide global settings, which [`configure`]
//! and [`reset`] mutate. A record type snapshots the global settings when it is
//! registered (see [`crate::model::LockModel`]) and may override individual
//! parameters afterwards.

use crate::error::{LockerError, Result};
use crate::locking::strategy::{BackoffAlgorithm, NamingStrategy};
use crate::locking::timeout::{parse_seconds, seconds};
use crate::store::WriteConcern;
use config::{Config, Environment, File};
use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::{OnceLock, PoisonError, RwLock};
use std::time::Duration;

pub const DEFAULT_LOCKING_NAME_FIELD: &str = "locking_name";
pub const DEFAULT_LOCKED_AT_FIELD: &str = "locked_at";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAXIMUM_BACKOFF: Duration = Duration::from_secs(60);

/// Prefix of environment variables overriding settings, e.g. `DOCLOCK_LOCK_TIMEOUT`.
pub const ENV_PREFIX: &str = "DOCLOCK";

/// Names accepted by string-keyed configuration entry points.
pub const PARAMETER_NAMES: [&str; 7] = [
    "locking_name_field",
    "locked_at_field",
    "lock_timeout",
    "maximum_backoff",
    "locker_write_concern",
    "backoff_algorithm",
    "locking_name_generator",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    LockingNameField,
    LockedAtField,
    LockTimeout,
    MaximumBackoff,
    LockerWriteConcern,
    BackoffAlgorithm,
    LockingNameGenerator,
}

impl Parameter {
    pub const ALL: [Parameter; 7] = [
        Parameter::LockingNameField,
        Parameter::LockedAtField,
        Parameter::LockTimeout,
        Parameter::MaximumBackoff,
        Parameter::LockerWriteConcern,
        Parameter::BackoffAlgorithm,
        Parameter::LockingNameGenerator,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::LockingNameField => PARAMETER_NAMES[0],
            Parameter::LockedAtField => PARAMETER_NAMES[1],
            Parameter::LockTimeout => PARAMETER_NAMES[2],
            Parameter::MaximumBackoff => PARAMETER_NAMES[3],
            Parameter::LockerWriteConcern => PARAMETER_NAMES[4],
            Parameter::BackoffAlgorithm => PARAMETER_NAMES[5],
            Parameter::LockingNameGenerator => PARAMETER_NAMES[6],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|parameter| parameter.name() == name)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tier a resolved parameter value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingSource {
    #[default]
    Default,
    Global,
    Model,
}

impl fmt::Display for SettingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SettingSource::Default => "built-in default",
            SettingSource::Global => "global configuration",
            SettingSource::Model => "record type configuration",
        };
        f.write_str(label)
    }
}

/// Value handed to string-keyed configuration entry points.
#[derive(Debug, Clone)]
pub enum SettingValue {
    Text(String),
    Seconds(f64),
    Duration(Duration),
    WriteConcern(WriteConcern),
    Backoff(BackoffAlgorithm),
    Naming(NamingStrategy),
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Seconds(value)
    }
}

impl From<u64> for SettingValue {
    fn from(value: u64) -> Self {
        SettingValue::Duration(Duration::from_secs(value))
    }
}

impl From<Duration> for SettingValue {
    fn from(value: Duration) -> Self {
        SettingValue::Duration(value)
    }
}

impl From<WriteConcern> for SettingValue {
    fn from(value: WriteConcern) -> Self {
        SettingValue::WriteConcern(value)
    }
}

impl From<BackoffAlgorithm> for SettingValue {
    fn from(value: BackoffAlgorithm) -> Self {
        SettingValue::Backoff(value)
    }
}

impl From<NamingStrategy> for SettingValue {
    fn from(value: NamingStrategy) -> Self {
        SettingValue::Naming(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockerSettings {
    pub locking_name_field: String,
    pub locked_at_field: String,
    pub lock_timeout: Duration,
    pub maximum_backoff: Duration,
    pub locker_write_concern: WriteConcern,
    pub backoff_algorithm: BackoffAlgorithm,
    pub locking_name_generator: NamingStrategy,
}

impl Default for LockerSettings {
    fn default() -> Self {
        Self {
            locking_name_field: DEFAULT_LOCKING_NAME_FIELD.to_string(),
            locked_at_field: DEFAULT_LOCKED_AT_FIELD.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            maximum_backoff: DEFAULT_MAXIMUM_BACKOFF,
            locker_write_concern: WriteConcern::default(),
            backoff_algorithm: BackoffAlgorithm::Exponential,
            locking_name_generator: NamingStrategy::Secure,
        }
    }
}

impl LockerSettings {
    /// Reads defaults overlaid with an optional settings file and `DOCLOCK_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();
        LockerSettingsFile::load(path)?.apply_to(&mut settings)?;
        Ok(settings)
    }

    /// Sets one parameter, converting and validating the value.
    pub fn apply(&mut self, parameter: Parameter, value: SettingValue) -> Result<()> {
        match parameter {
            Parameter::LockingNameField => {
                self.locking_name_field = field_name(parameter, value)?;
            }
            Parameter::LockedAtField => {
                self.locked_at_field = field_name(parameter, value)?;
            }
            Parameter::LockTimeout => {
                self.lock_timeout = duration(parameter, value)?;
            }
            Parameter::MaximumBackoff => {
                self.maximum_backoff = duration(parameter, value)?;
            }
            Parameter::LockerWriteConcern => {
                self.locker_write_concern = match value {
                    SettingValue::WriteConcern(concern) => concern,
                    SettingValue::Text(text) => text.parse()?,
                    other => return Err(type_mismatch(parameter, &other)),
                };
            }
            Parameter::BackoffAlgorithm => {
                self.backoff_algorithm = match value {
                    SettingValue::Backoff(algorithm) => algorithm,
                    SettingValue::Text(text) => text.parse()?,
                    other => return Err(type_mismatch(parameter, &other)),
                };
            }
            Parameter::LockingNameGenerator => {
                self.locking_name_generator = match value {
                    SettingValue::Naming(strategy) => strategy,
                    SettingValue::Text(text) => text.parse()?,
                    other => return Err(type_mismatch(parameter, &other)),
                };
            }
        }
        Ok(())
    }

    /// Copies one parameter's value from `other`.
    pub fn copy_from(&mut self, other: &LockerSettings, parameter: Parameter) {
        match parameter {
            Parameter::LockingNameField => {
                self.locking_name_field = other.locking_name_field.clone();
            }
            Parameter::LockedAtField => self.locked_at_field = other.locked_at_field.clone(),
            Parameter::LockTimeout => self.lock_timeout = other.lock_timeout,
            Parameter::MaximumBackoff => self.maximum_backoff = other.maximum_backoff,
            Parameter::LockerWriteConcern => {
                self.locker_write_concern = other.locker_write_concern;
            }
            Parameter::BackoffAlgorithm => {
                self.backoff_algorithm = other.backoff_algorithm.clone();
            }
            Parameter::LockingNameGenerator => {
                self.locking_name_generator = other.locking_name_generator.clone();
            }
        }
    }

    /// Whether `parameter` differs between the two settings.
    pub fn differs(&self, other: &LockerSettings, parameter: Parameter) -> bool {
        match parameter {
            Parameter::LockingNameField => self.locking_name_field != other.locking_name_field,
            Parameter::LockedAtField => self.locked_at_field != other.locked_at_field,
            Parameter::LockTimeout => self.lock_timeout != other.lock_timeout,
            Parameter::MaximumBackoff => self.maximum_backoff != other.maximum_backoff,
            Parameter::LockerWriteConcern => {
                self.locker_write_concern != other.locker_write_concern
            }
            Parameter::BackoffAlgorithm => self.backoff_algorithm != other.backoff_algorithm,
            Parameter::LockingNameGenerator => {
                self.locking_name_generator != other.locking_name_generator
            }
        }
    }
}

fn field_name(parameter: Parameter, value: SettingValue) -> Result<String> {
    match value {
        SettingValue::Text(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        SettingValue::Text(_) => Err(LockerError::InvalidParameterValue {
            parameter: parameter.name().to_string(),
            details: "field name must not be empty".to_string(),
        }),
        other => Err(type_mismatch(parameter, &other)),
    }
}

fn duration(parameter: Parameter, value: SettingValue) -> Result<Duration> {
    match value {
        SettingValue::Duration(duration) => Ok(duration),
        SettingValue::Seconds(value) => seconds(parameter.name(), value),
        SettingValue::Text(text) => parse_seconds(parameter.name(), &text),
        other => Err(type_mismatch(parameter, &other)),
    }
}

fn type_mismatch(parameter: Parameter, value: &SettingValue) -> LockerError {
    LockerError::InvalidParameterValue {
        parameter: parameter.name().to_string(),
        details: format!("unsupported value {value:?}"),
    }
}

/// Settings file / environment representation. Strategies are referenced by
/// identifier; durations are seconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LockerSettingsFile {
    pub locking_name_field: Option<String>,
    pub locked_at_field: Option<String>,
    pub lock_timeout: Option<f64>,
    pub maximum_backoff: Option<f64>,
    pub locker_write_concern: Option<WriteConcern>,
    pub backoff_algorithm: Option<String>,
    pub locking_name_generator: Option<String>,
}

impl LockerSettingsFile {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if path.exists() {
                debug!("Loading locker settings from {}", path.display());
            } else {
                debug!(
                    "Locker settings file not found at {}, using defaults",
                    path.display()
                );
            }
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let file: LockerSettingsFile = builder.build()?.try_deserialize()?;
        Ok(file)
    }

    pub fn apply_to(&self, settings: &mut LockerSettings) -> Result<()> {
        if let Some(field) = &self.locking_name_field {
            settings.apply(Parameter::LockingNameField, field.as_str().into())?;
        }
        if let Some(field) = &self.locked_at_field {
            settings.apply(Parameter::LockedAtField, field.as_str().into())?;
        }
        if let Some(timeout) = self.lock_timeout {
            settings.apply(Parameter::LockTimeout, timeout.into())?;
        }
        if let Some(backoff) = self.maximum_backoff {
            settings.apply(Parameter::MaximumBackoff, backoff.into())?;
        }
        if let Some(concern) = self.locker_write_concern {
            settings.apply(Parameter::LockerWriteConcern, concern.into())?;
        }
        if let Some(algorithm) = &self.backoff_algorithm {
            settings.apply(Parameter::BackoffAlgorithm, algorithm.as_str().into())?;
        }
        if let Some(generator) = &self.locking_name_generator {
            settings.apply(Parameter::LockingNameGenerator, generator.as_str().into())?;
        }
        Ok(())
    }
}

static GLOBAL_SETTINGS: OnceLock<RwLock<LockerSettings>> = OnceLock::new();

fn global() -> &'static RwLock<LockerSettings> {
    GLOBAL_SETTINGS.get_or_init(|| RwLock::new(LockerSettings::default()))
}

/// Snapshot of the current process-wide settings.
pub fn global_settings() -> LockerSettings {
    global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Mutates the process-wide settings. Record types registered afterwards pick up
/// the new values; already registered types keep their snapshot.
pub fn configure<F>(update: F)
where
    F: FnOnce(&mut LockerSettings),
{
    let mut settings = global().write().unwrap_or_else(PoisonError::into_inner);
    update(&mut settings);
}

/// Overlays a settings file and `DOCLOCK_*` environment variables onto the
/// process-wide settings.
pub fn configure_from_file(path: &Path) -> Result<()> {
    let file = LockerSettingsFile::load(Some(path))?;
    let mut applied: Result<()> = Ok(());
    configure(|global| {
        let mut staged = global.clone();
        applied = file.apply_to(&mut staged).map(|()| *global = staged);
    });
    applied?;
    info!("Applied locker settings from {}", path.display());
    Ok(())
}

/// Restores the built-in defaults.
pub fn reset() {
    configure(|settings| *settings = LockerSettings::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = LockerSettings::default();
        assert_eq!(settings.locking_name_field, "locking_name");
        assert_eq!(settings.locked_at_field, "locked_at");
        assert_eq!(settings.lock_timeout, Duration::from_secs(5));
        assert_eq!(settings.maximum_backoff, Duration::from_secs(60));
        assert_eq!(settings.locker_write_concern, WriteConcern::acknowledged(1));
        assert_eq!(settings.backoff_algorithm, BackoffAlgorithm::Exponential);
        assert_eq!(settings.locking_name_generator, NamingStrategy::Secure);
    }

    #[test]
    fn test_parameter_names_round_trip() {
        for parameter in Parameter::ALL {
            assert_eq!(Parameter::from_name(parameter.name()), Some(parameter));
        }
        assert_eq!(Parameter::from_name("lock_timout"), None);
    }

    #[test]
    fn test_apply_converts_values() {
        let mut settings = LockerSettings::default();
        settings
            .apply(Parameter::LockTimeout, SettingValue::from("2.5"))
            .unwrap();
        settings
            .apply(Parameter::MaximumBackoff, SettingValue::from(30u64))
            .unwrap();
        settings
            .apply(Parameter::LockerWriteConcern, SettingValue::from("majority"))
            .unwrap();
        settings
            .apply(Parameter::BackoffAlgorithm, SettingValue::from("locked_at_backoff"))
            .unwrap();

        assert_eq!(settings.lock_timeout, Duration::from_millis(2_500));
        assert_eq!(settings.maximum_backoff, Duration::from_secs(30));
        assert_eq!(settings.locker_write_concern, WriteConcern::majority());
        assert_eq!(settings.backoff_algorithm, BackoffAlgorithm::LockedAt);
    }

    #[test]
    fn test_apply_rejects_mismatched_values() {
        let mut settings = LockerSettings::default();
        let err = settings
            .apply(Parameter::LockingNameField, SettingValue::from(5u64))
            .unwrap_err();
        assert!(matches!(err, LockerError::InvalidParameterValue { .. }));

        assert!(
            settings
                .apply(Parameter::LockedAtField, SettingValue::from("  "))
                .is_err()
        );
        assert!(
            settings
                .apply(Parameter::LockTimeout, SettingValue::from("soon"))
                .is_err()
        );
        assert_eq!(settings, LockerSettings::default());
    }

    #[test]
    fn test_copy_and_differs() {
        let mut custom = LockerSettings::default();
        custom.lock_timeout = Duration::from_secs(3);
        let mut settings = LockerSettings::default();

        assert!(settings.differs(&custom, Parameter::LockTimeout));
        assert!(!settings.differs(&custom, Parameter::MaximumBackoff));
        settings.copy_from(&custom, Parameter::LockTimeout);
        assert_eq!(settings, custom);
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = LockerSettings::load(Some(&temp_dir.path().join("locker.toml"))).unwrap();
        assert_eq!(settings, LockerSettings::default());
    }

    #[test]
    #[serial]
    fn test_load_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locker.toml");
        fs::write(
            &path,
            r#"
locking_name_field = "locker_locking_name"
locked_at_field = "locker_locked_at"
lock_timeout = 3
maximum_backoff = 30.5
locker_write_concern = "majority"
backoff_algorithm = "locked_at_backoff"
"#,
        )
        .unwrap();

        let settings = LockerSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.locking_name_field, "locker_locking_name");
        assert_eq!(settings.locked_at_field, "locker_locked_at");
        assert_eq!(settings.lock_timeout, Duration::from_secs(3));
        assert_eq!(settings.maximum_backoff, Duration::from_millis(30_500));
        assert_eq!(settings.locker_write_concern, WriteConcern::majority());
        assert_eq!(settings.backoff_algorithm, BackoffAlgorithm::LockedAt);
        assert_eq!(settings.locking_name_generator, NamingStrategy::Secure);
    }

    #[test]
    #[serial]
    fn test_load_rejects_unknown_strategy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locker.toml");
        fs::write(&path, r#"backoff_algorithm = "linear""#).unwrap();

        let err = LockerSettings::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("linear"));
    }

    #[test]
    #[serial]
    fn test_configure_and_reset_global() {
        reset();
        configure(|settings| {
            settings.lock_timeout = Duration::from_secs(9);
            settings.locking_name_field = "owner".to_string();
        });
        let settings = global_settings();
        assert_eq!(settings.lock_timeout, Duration::from_secs(9));
        assert_eq!(settings.locking_name_field, "owner");

        reset();
        assert_eq!(global_settings(), LockerSettings::default());
    }

    #[test]
    #[serial]
    fn test_configure_from_file_updates_global() {
        reset();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locker.toml");
        fs::write(&path, "lock_timeout = 12\nlocker_write_concern = 2\n").unwrap();

        configure_from_file(&path).unwrap();
        let settings = global_settings();
        assert_eq!(settings.lock_timeout, Duration::from_secs(12));
        assert_eq!(settings.locker_write_concern, WriteConcern::acknowledged(2));
        reset();
    }

    #[test]
    #[serial]
    fn test_configure_from_file_keeps_other_global_changes() {
        reset();
        configure(|settings| settings.locking_name_field = "owner".to_string());
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locker.toml");
        fs::write(&path, "lock_timeout = 4\n").unwrap();

        configure_from_file(&path).unwrap();
        let settings = global_settings();
        assert_eq!(settings.locking_name_field, "owner");
        assert_eq!(settings.lock_timeout, Duration::from_secs(4));
        reset();
    }

    #[test]
    #[serial]
    fn test_configure_from_invalid_file_leaves_global_untouched() {
        reset();
        configure(|settings| settings.lock_timeout = Duration::from_secs(7));
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locker.toml");
        fs::write(&path, "locked_at_field = \"held_since\"\nmaximum_backoff = -1\n").unwrap();

        let err = configure_from_file(&path).unwrap_err();
        assert!(matches!(err, LockerError::InvalidParameterValue { .. }));
        let settings = global_settings();
        assert_eq!(settings.lock_timeout, Duration::from_secs(7));
        assert_eq!(settings.locked_at_field, "locked_at");
        reset();
    }
}
