pub mod compose;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod executor;
pub mod format;
pub mod options;
pub mod registry;
pub mod relation;
pub mod statement;
pub mod value;

pub use compose::{compose, compose_statement, GroupClause};
pub use descriptor::{
    AggregateKind, Cardinality, ColumnDescriptor, EntityDescriptor, JunctionType,
    RelationDescriptor, RelationalColumn,
};
pub use entity::{
    blank, downcast, filter_by_filterable, filter_by_key, key_value, AnyEntity, Entity,
    EntityFactory, Fields, Related,
};
pub use error::{DataError, ValidationError};
pub use executor::{ExecOutcome, Executor, Row, Transaction};
pub use options::{BindMode, ComposeOptions, DatabaseEngine, PersistenceAction};
pub use registry::{describe, filterable_columns_of, listable_columns_of, relations_of};
pub use relation::{load_composition, parse_composition, Composition};
pub use statement::{Literal, Statement};
pub use value::{FromValue, Value, ValueType};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        blank, AnyEntity, Cardinality, ColumnDescriptor, ComposeOptions, DataError,
        DatabaseEngine, Entity, EntityDescriptor, Executor, Fields, PersistenceAction,
        RelationDescriptor, Related, Transaction, Value, ValueType,
    };
}
