use std::collections::HashMap;

use async_trait::async_trait;

use crate::descriptor::EntityDescriptor;
use crate::entity::{AnyEntity, EntityFactory};
use crate::error::DataError;
use crate::statement::Statement;
use crate::value::Value;

/// Result of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Generated key of the inserted row, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// One fetched row, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, property: impl Into<String>, value: Value) {
        self.values.insert(property.into(), value);
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(property, value.into());
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Hydrate a blank instance; values are coerced to the declared types.
    pub fn hydrate(&self, descriptor: &EntityDescriptor, factory: EntityFactory) -> Box<dyn AnyEntity> {
        let mut entity = factory();
        self.apply(descriptor, entity.as_mut());
        entity
    }

    pub fn apply(&self, descriptor: &EntityDescriptor, entity: &mut dyn AnyEntity) {
        for column in descriptor.columns() {
            if let Some(value) = self.values.get(column.property) {
                entity.set(column.property, value.clone().coerce(column.value_type));
            }
        }
    }
}

/// Runs composed statements against a live connection.
///
/// The relation engine and the repository talk to the database only through
/// this trait. Transactions are scoped to the handle returned by
/// [`begin`](Executor::begin): statements run through it belong to that unit
/// of work alone, while the executor keeps serving other callers.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError>;

    /// First column of the first row as an integer; `0` when no row matches.
    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError>;

    /// Rows decoded against the columns of `descriptor`.
    async fn fetch_rows(
        &self,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError>;

    /// Open a transaction on a connection of its own.
    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DataError>;
}

/// An open unit of work. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self: Box<Self>) -> Result<(), DataError>;

    async fn rollback(self: Box<Self>) -> Result<(), DataError>;
}
