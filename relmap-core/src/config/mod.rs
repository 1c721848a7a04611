mod loader;
pub mod mapper;
pub mod typed;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use mapper::{CacheSettings, MapperConfig, ReplicaSettings};
pub use typed::{ConfigProperties, PropertyMeta};
pub use value::{ConfigValue, FromConfigValue};

/// Environment variable selecting the active profile.
pub const PROFILE_ENV: &str = "RELMAP_PROFILE";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// A value was read but is not acceptable (e.g. an unknown engine name).
    Invalid { key: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Invalid { key, message } => {
                write!(f, "Invalid config value for '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Mapper configuration loaded from YAML files, `.env` files and environment
/// variables, flattened to dot-separated keys.
///
/// Resolution order (lowest to highest priority):
/// 1. `relmap.yaml`
/// 2. `relmap-{profile}.yaml`
/// 3. `.env`, then `.env.{profile}` (never overwriting variables already set)
/// 4. `RELMAP_*` environment variables (`RELMAP_CACHE_ENABLED` overrides
///    `relmap.cache.enabled`)
///
/// The profile comes from `RELMAP_PROFILE`, falling back to the argument.
#[derive(Debug, Clone)]
pub struct RelmapConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl RelmapConfig {
    /// Load from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(".", profile)
    }

    /// Load with `dir` as the location of the YAML and `.env` files.
    pub fn load_from(dir: impl AsRef<Path>, profile: &str) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let profile = std::env::var(PROFILE_ENV).unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("relmap.yaml"), &mut values)?;
        loader::load_yaml_file(&dir.join(format!("relmap-{profile}.yaml")), &mut values)?;

        for env_file in [dir.join(".env"), dir.join(format!(".env.{profile}"))] {
            load_env_file(&env_file);
        }

        for (name, raw) in std::env::vars() {
            if let Some(key) = loader::env_key(&name) {
                values.insert(key, ConfigValue::String(raw));
            }
        }

        tracing::debug!(profile = %profile, keys = values.len(), "configuration loaded");
        Ok(Self { values, profile })
    }

    /// Parse a YAML document, without files or environment.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(Self {
            values,
            profile: profile.to_string(),
        })
    }

    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Typed value under a dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Typed value, or `default` when the key is missing.
    ///
    /// A present value of the wrong type is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.values.get(key) {
            Some(value) => V::from_config_value(value, key),
            None => Ok(default),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Build a typed section.
    pub fn section<C: ConfigProperties>(&self) -> Result<C, ConfigError> {
        C::from_config(self)
    }
}

fn load_env_file(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => tracing::debug!(file = %path.display(), "loaded env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(file = %path.display(), error = %err, "ignoring env file"),
    }
}
