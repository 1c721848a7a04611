use std::any::Any;
use std::sync::Arc;

use serde::Serialize;

use crate::descriptor::EntityDescriptor;
use crate::error::DataError;
use crate::registry;
use crate::value::Value;

/// Constructor of a blank instance of a relation target or intermediary.
pub type EntityFactory = fn() -> Box<dyn AnyEntity>;

/// Factory for `T`, for use in relation declarations.
pub fn blank<T: Entity>() -> Box<dyn AnyEntity> {
    Box::new(T::default())
}

/// Property access by name.
///
/// This is the object-safe half of [`Entity`]: the relation engine and the
/// cache only ever see models through it.
pub trait Fields: Send + Sync {
    /// Current value of a mapped property, `None` for unknown names.
    fn get(&self, property: &str) -> Option<Value>;

    /// Assign a mapped property. Unknown names are ignored.
    fn set(&mut self, property: &str, value: Value);

    /// Current content of a relation property.
    fn related(&self, _property: &str) -> Option<Related> {
        None
    }

    /// Replace the content of a relation property.
    fn assign_related(&mut self, _property: &str, _related: Related) {}
}

/// A model type mapped to exactly one table with exactly one key column.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Serialize)]
/// struct Sample { id: i32, name: Option<String> }
///
/// impl Fields for Sample {
///     fn get(&self, property: &str) -> Option<Value> {
///         match property {
///             "Id" => Some(self.id.into()),
///             "Name" => Some(self.name.clone().into()),
///             _ => None,
///         }
///     }
///     fn set(&mut self, property: &str, value: Value) {
///         match property {
///             "Id" => self.id = value.take().unwrap_or_default(),
///             "Name" => self.name = value.take().unwrap_or_default(),
///             _ => {}
///         }
///     }
/// }
///
/// impl Entity for Sample {
///     fn describe() -> Result<EntityDescriptor, DataError> {
///         EntityDescriptor::builder()
///             .table("sample_entity")
///             .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
///             .column(ColumnDescriptor::new("Name", ValueType::String).column("name"))
///             .build()
///     }
/// }
/// ```
pub trait Entity: Fields + Clone + Default + Serialize + 'static {
    fn describe() -> Result<EntityDescriptor, DataError>;
}

/// Type-erased entity.
pub trait AnyEntity: Fields + Any {
    fn descriptor(&self) -> Result<Arc<EntityDescriptor>, DataError>;
    fn as_fields(&self) -> &dyn Fields;
    fn clone_entity(&self) -> Box<dyn AnyEntity>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn type_name(&self) -> &'static str;
    fn to_json(&self) -> Result<String, serde_json::Error>;
}

impl<T: Entity> AnyEntity for T {
    fn descriptor(&self) -> Result<Arc<EntityDescriptor>, DataError> {
        registry::describe::<T>()
    }

    fn as_fields(&self) -> &dyn Fields {
        self
    }

    fn clone_entity(&self) -> Box<dyn AnyEntity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Clone for Box<dyn AnyEntity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}

impl std::fmt::Debug for dyn AnyEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_json() {
            Ok(json) => write!(f, "{}({json})", self.type_name()),
            Err(_) => write!(f, "{}", self.type_name()),
        }
    }
}

/// Content of a relation property.
#[derive(Debug, Clone)]
pub enum Related {
    One(Box<dyn AnyEntity>),
    Many(Vec<Box<dyn AnyEntity>>),
}

impl Related {
    pub fn one<T: Entity>(item: T) -> Self {
        Related::One(Box::new(item))
    }

    pub fn many<T: Entity>(items: impl IntoIterator<Item = T>) -> Self {
        Related::Many(
            items
                .into_iter()
                .map(|item| Box::new(item) as Box<dyn AnyEntity>)
                .collect(),
        )
    }

    /// The single related instance as `T`.
    pub fn into_one<T: Entity>(self) -> Option<T> {
        match self {
            Related::One(item) => downcast(item),
            Related::Many(items) => items.into_iter().next().and_then(downcast),
        }
    }

    /// The related instances as `T`; elements of another type are dropped.
    pub fn into_many<T: Entity>(self) -> Vec<T> {
        match self {
            Related::One(item) => downcast(item).into_iter().collect(),
            Related::Many(items) => items.into_iter().filter_map(downcast).collect(),
        }
    }
}

/// Recover the concrete type of a type-erased entity.
pub fn downcast<T: Entity>(item: Box<dyn AnyEntity>) -> Option<T> {
    item.into_any().downcast::<T>().ok().map(|b| *b)
}

/// Key value of an instance, through its descriptor.
pub fn key_value(entity: &dyn AnyEntity, descriptor: &EntityDescriptor) -> Value {
    entity
        .get(descriptor.key_column().property)
        .unwrap_or(Value::Null)
}

/// A blank `T` with only its key set, usable as a Get filter.
pub fn filter_by_key<T: Entity>(key: impl Into<Value>) -> Result<T, DataError> {
    let descriptor = registry::describe::<T>()?;
    let key_column = descriptor.key_column();
    let mut filter = T::default();
    filter.set(key_column.property, key.into().coerce(key_column.value_type));
    Ok(filter)
}

/// A blank `T` whose filterable text columns all hold `criteria`.
///
/// Used by free-text search: combined with OR-joined Query predicates, the
/// result matches rows where any filterable column contains the criteria.
pub fn filter_by_filterable<T: Entity>(criteria: &str) -> Result<T, DataError> {
    let descriptor = registry::describe::<T>()?;
    let mut filter = T::default();
    for column in descriptor.filterable_columns() {
        let value = Value::Text(criteria.to_string()).coerce(column.value_type);
        match (&value, column.value_type) {
            (Value::Text(_), crate::value::ValueType::String) => filter.set(column.property, value),
            (Value::Text(_), _) | (Value::Null, _) => {}
            _ => filter.set(column.property, value),
        }
    }
    Ok(filter)
}
