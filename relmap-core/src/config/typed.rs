use super::{ConfigError, RelmapConfig};

/// Metadata about a single configuration property.
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    /// Key relative to the section prefix (e.g. `"cache.enabled"`).
    pub key: &'static str,
    pub type_name: &'static str,
    /// Default rendered as text, `None` when the property is required.
    pub default_value: Option<&'static str>,
    pub description: &'static str,
}

impl PropertyMeta {
    pub fn full_key(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.key.to_string()
        } else {
            format!("{prefix}.{}", self.key)
        }
    }

    pub fn required(&self) -> bool {
        self.default_value.is_none()
    }
}

/// A strongly-typed section of [`RelmapConfig`] rooted at [`prefix`](Self::prefix).
pub trait ConfigProperties: Sized {
    fn prefix() -> &'static str;

    fn properties_metadata() -> Vec<PropertyMeta>;

    fn from_config(config: &RelmapConfig) -> Result<Self, ConfigError>;

    /// Full keys of required properties absent from `config`.
    fn missing_keys(config: &RelmapConfig) -> Vec<String> {
        Self::properties_metadata()
            .iter()
            .filter(|meta| meta.required())
            .map(|meta| meta.full_key(Self::prefix()))
            .filter(|key| !config.contains_key(key))
            .collect()
    }
}
