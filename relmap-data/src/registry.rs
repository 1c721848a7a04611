use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::descriptor::{ColumnDescriptor, EntityDescriptor, RelationDescriptor};
use crate::entity::Entity;
use crate::error::DataError;

static DESCRIPTORS: OnceLock<DashMap<TypeId, Arc<EntityDescriptor>>> = OnceLock::new();

fn descriptors() -> &'static DashMap<TypeId, Arc<EntityDescriptor>> {
    DESCRIPTORS.get_or_init(DashMap::new)
}

/// Resolve the descriptor of `T`, building and memoizing it on first use.
///
/// Invalid declarations are never memoized, so every call for a broken model
/// reports the same configuration error.
pub fn describe<T: Entity>() -> Result<Arc<EntityDescriptor>, DataError> {
    let type_id = TypeId::of::<T>();
    if let Some(found) = descriptors().get(&type_id) {
        return Ok(found.value().clone());
    }
    let built = Arc::new(T::describe()?.with_type_name(std::any::type_name::<T>()));
    tracing::debug!(
        entity = built.type_name(),
        table = %built.table_name(),
        columns = built.columns().len(),
        relations = built.relations().len(),
        "registered entity descriptor"
    );
    Ok(descriptors().entry(type_id).or_insert(built).value().clone())
}

pub fn relations_of(descriptor: &EntityDescriptor) -> &[RelationDescriptor] {
    descriptor.relations()
}

pub fn filterable_columns_of(descriptor: &EntityDescriptor) -> Vec<&ColumnDescriptor> {
    descriptor.filterable_columns().collect()
}

pub fn listable_columns_of(descriptor: &EntityDescriptor) -> Vec<&ColumnDescriptor> {
    descriptor.listable_columns().collect()
}
