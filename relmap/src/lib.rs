//! relmap: a metadata-driven SQL data mapper.
//!
//! This facade crate re-exports the relmap sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use relmap::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate                                 |
//! |------------|---------|---------------------------------------|
//! | `sqlx`     | **yes** | `relmap-data-sqlx` (implies the rest) |
//! | `cache`    | **yes** | `relmap-cache`                        |
//! | `executor` | **yes** | `relmap-executor`                     |
//! | `full`     | no      | All of the above                      |
//!
//! `relmap-core` (configuration, tracing) and `relmap-data` (descriptors,
//! composition, relations) are always available.

pub use relmap_core;
pub use relmap_data;

pub use relmap_core::{init_tracing, MapperConfig, RelmapConfig};

#[cfg(feature = "cache")]
pub use relmap_cache;

#[cfg(feature = "executor")]
pub use relmap_executor;

#[cfg(feature = "sqlx")]
pub use relmap_data_sqlx;

/// Unified prelude: import everything with `use relmap::prelude::*`.
pub mod prelude {
    pub use relmap_core::{init_tracing, LogFormat, MapperConfig, RelmapConfig};
    pub use relmap_data::prelude::*;

    #[cfg(feature = "cache")]
    pub use relmap_cache::ResultCache;

    #[cfg(feature = "executor")]
    pub use relmap_executor::{PoolConfig, WorkerPool};

    #[cfg(feature = "sqlx")]
    pub use relmap_data_sqlx::prelude::*;
}
