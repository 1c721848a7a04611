//! Configuration and logging setup shared by the relmap crates.

pub mod config;
pub mod tracing_setup;

pub use config::{
    CacheSettings, ConfigError, ConfigProperties, ConfigValue, FromConfigValue, MapperConfig,
    PropertyMeta, RelmapConfig, ReplicaSettings,
};
pub use tracing_setup::{init_tracing, try_init_tracing, LogFormat};
