//! # relmap-data-sqlx: SQLx backend and repository orchestration
//!
//! This crate runs what `relmap-data` composes. It provides an
//! [`Executor`](relmap_data::Executor) over an `sqlx` SQLite pool and the
//! [`Repository`] that ties composition, relation loading, the result cache
//! and replica fan-out together.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqliteExecutor`] | `Executor` over `sqlx::SqlitePool` |
//! | [`SqliteTransaction`] | One unit of work on a checked-out connection |
//! | [`Repository`] | CRUD, search, bulk search and cascading writes for one model |
//! | [`QueryOptions`] | Paging, ordering, grouping and projection of reads |
//! | [`Tx`] | Transaction guard over any `Executor` |
//! | [`ReplicaSet`] | Replicas written asynchronously on a worker pool |
//! | [`SqlxErrorExt`] | Converts `sqlx::Error` into `DataError` |
//!
//! # Quick start
//!
//! ```ignore
//! use relmap_data_sqlx::prelude::*;
//!
//! let config: MapperConfig = RelmapConfig::load("dev")?.section()?;
//! let executor = Arc::new(SqliteExecutor::connect("sqlite://app.db").await?);
//! let repo = Repository::<Customer>::new(executor, &config);
//!
//! let id = repo.add(&mut customer, true).await?;
//! let found = repo.query(&Customer::named("ada"), &QueryOptions::new().limit(10)).await?;
//! ```

pub mod error;
pub mod executor;
pub mod replica;
pub mod repository;
pub mod tx;

pub use error::{SqlxErrorExt, SqlxResult};
pub use executor::{SqliteExecutor, SqliteTransaction};
pub use replica::{ReplicaConnector, ReplicaSet, SqliteConnector};
pub use repository::{QueryOptions, Repository};
pub use tx::Tx;

/// Re-exports of the most commonly used types from `relmap-data` and this crate.
pub mod prelude {
    pub use crate::{QueryOptions, ReplicaSet, Repository, SqliteExecutor, SqlxErrorExt, Tx};
    pub use relmap_core::{MapperConfig, RelmapConfig};
    pub use relmap_data::prelude::*;
}
