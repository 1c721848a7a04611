use relmap_data::{BindMode, ComposeOptions, DatabaseEngine};

use super::typed::{ConfigProperties, PropertyMeta};
use super::{ConfigError, RelmapConfig};

/// Result cache switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Resident-memory ceiling in MiB; `0` disables the check.
    pub memory_limit_mb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_limit_mb: 0,
        }
    }
}

/// Secondary databases receiving every successful primary write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSettings {
    pub urls: Vec<String>,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for ReplicaSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            workers: 2,
            queue_capacity: 64,
        }
    }
}

/// The `relmap` section: engine dialect, binding and the cache/replica knobs.
///
/// ```yaml
/// relmap:
///   engine: sqlite
///   binding: bound
///   cache:
///     enabled: true
///     memory_limit_mb: 512
///   replicas:
///     urls: ["sqlite://replica.db"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapperConfig {
    pub engine: DatabaseEngine,
    pub read_uncommitted: bool,
    pub binding: BindMode,
    pub cache: CacheSettings,
    pub replicas: ReplicaSettings,
}

impl MapperConfig {
    /// Composition defaults for every statement this configuration drives.
    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions::new(self.engine)
            .binding(self.binding)
            .read_uncommitted(self.read_uncommitted)
    }
}

fn key(name: &str) -> String {
    format!("{}.{name}", MapperConfig::prefix())
}

fn parse_named<T>(
    config: &RelmapConfig,
    name: &str,
    default: T,
    parse: fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    let full = key(name);
    match config.get_or::<Option<String>>(&full, None)? {
        None => Ok(default),
        Some(raw) => parse(&raw).ok_or_else(|| ConfigError::Invalid {
            key: full,
            message: format!("unrecognized value '{raw}'"),
        }),
    }
}

impl ConfigProperties for MapperConfig {
    fn prefix() -> &'static str {
        "relmap"
    }

    fn properties_metadata() -> Vec<PropertyMeta> {
        let meta = |key, type_name, default_value, description| PropertyMeta {
            key,
            type_name,
            default_value: Some(default_value),
            description,
        };
        vec![
            meta("engine", "DatabaseEngine", "sqlite", "SQL dialect: mysql, sqlserver, postgresql or sqlite"),
            meta("read_uncommitted", "bool", "false", "Dirty-read lock hint on SQL Server reads"),
            meta("binding", "BindMode", "inline", "inline literals or bound parameters"),
            meta("cache.enabled", "bool", "true", "Serve Get/Query results from the result cache"),
            meta("cache.memory_limit_mb", "u64", "0", "Drop the cache above this resident size"),
            meta("replicas.urls", "Vec<String>", "[]", "Connection URLs of replica databases"),
            meta("replicas.workers", "usize", "2", "Workers applying replica writes"),
            meta("replicas.queue_capacity", "usize", "64", "Pending replica writes before submitters wait"),
        ]
    }

    fn from_config(config: &RelmapConfig) -> Result<Self, ConfigError> {
        let defaults = MapperConfig::default();
        Ok(Self {
            engine: parse_named(config, "engine", defaults.engine, DatabaseEngine::parse)?,
            read_uncommitted: config.get_or(&key("read_uncommitted"), defaults.read_uncommitted)?,
            binding: parse_named(config, "binding", defaults.binding, BindMode::parse)?,
            cache: CacheSettings {
                enabled: config.get_or(&key("cache.enabled"), defaults.cache.enabled)?,
                memory_limit_mb: config
                    .get_or(&key("cache.memory_limit_mb"), defaults.cache.memory_limit_mb)?,
            },
            replicas: ReplicaSettings {
                urls: config.get_or(&key("replicas.urls"), defaults.replicas.urls)?,
                workers: config.get_or(&key("replicas.workers"), defaults.replicas.workers)?,
                queue_capacity: config
                    .get_or(&key("replicas.queue_capacity"), defaults.replicas.queue_capacity)?,
            },
        })
    }
}
