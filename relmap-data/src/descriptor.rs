//! Mapping metadata for model types.
//!
//! Every model declares an [`EntityDescriptor`] once, through
//! [`EntityDescriptor::builder`], inside its `Entity::describe()`
//! implementation. The registry in [`crate::registry`] memoizes the result
//! per type, so the description is computed a single time and then shared by
//! every statement composed for that type.
//!
//! ```ignore
//! EntityDescriptor::builder()
//!     .table("sample_entity")
//!     .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
//!     .column(ColumnDescriptor::new("Name", ValueType::String).column("name").filterable())
//!     .relation(RelationDescriptor::one_to_many("Children", blank::<Child>, "ParentId"))
//!     .cacheable()
//!     .build()
//! ```

use crate::entity::EntityFactory;
use crate::error::DataError;
use crate::value::ValueType;

/// Table binding of a model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    pub schema: Option<&'static str>,
    pub name: &'static str,
}

impl TableBinding {
    /// `schema.name` when a schema is declared, `name` otherwise.
    pub fn qualified(&self) -> String {
        match self.schema {
            Some(schema) if !schema.is_empty() => format!("{schema}.{}", self.name),
            _ => self.name.to_string(),
        }
    }
}

/// How a joined table participates in a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionType {
    /// `INNER JOIN`: rows without a match are dropped.
    Mandatory,
    /// `LEFT JOIN`: rows without a match are kept.
    Optional,
}

/// Junction table placed between the base table and a joined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediaryTable {
    pub table: &'static str,
    /// Column of the junction table matched against the base table.
    pub local_column: &'static str,
    /// Column of the junction table matched against the joined table.
    pub foreign_column: &'static str,
}

/// A projected column that lives in another table and is brought in by a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalColumn {
    pub table: &'static str,
    pub column: &'static str,
    /// Column of the base table holding the join key.
    pub key_column: &'static str,
    /// Column of the joined table matched against `key_column`.
    pub foreign_key_column: &'static str,
    pub junction: JunctionType,
    pub intermediary: Option<IntermediaryTable>,
    /// Whether Query filters may constrain this column.
    pub filterable: bool,
}

impl RelationalColumn {
    pub fn new(
        table: &'static str,
        column: &'static str,
        key_column: &'static str,
        foreign_key_column: &'static str,
    ) -> Self {
        Self {
            table,
            column,
            key_column,
            foreign_key_column,
            junction: JunctionType::Mandatory,
            intermediary: None,
            filterable: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.junction = JunctionType::Optional;
        self
    }

    pub fn through(
        mut self,
        table: &'static str,
        local_column: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        self.junction = JunctionType::Optional;
        self.intermediary = Some(IntermediaryTable {
            table,
            local_column,
            foreign_column,
        });
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table.to_lowercase(), self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    Average,
    Minimum,
    Maximum,
}

impl AggregateKind {
    pub fn function(self) -> &'static str {
        match self {
            AggregateKind::Count => "COUNT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Average => "AVG",
            AggregateKind::Minimum => "MIN",
            AggregateKind::Maximum => "MAX",
        }
    }
}

/// An aggregate projection (`SUM(table.column) AS Property`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub column: &'static str,
}

/// Mapping of one model property to one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub property: &'static str,
    pub column: &'static str,
    pub value_type: ValueType,
    pub key: bool,
    pub foreign_key: bool,
    pub auto_generated: bool,
    pub filterable: bool,
    pub listable: bool,
    pub not_mapped: bool,
    pub required: bool,
    /// Property holding the upper bound of a from/to range on this column.
    pub range_partner: Option<&'static str>,
    pub joined: Option<RelationalColumn>,
    pub aggregate: Option<Aggregate>,
}

impl ColumnDescriptor {
    /// A plain column whose name matches the property name.
    pub fn new(property: &'static str, value_type: ValueType) -> Self {
        Self {
            property,
            column: property,
            value_type,
            key: false,
            foreign_key: false,
            auto_generated: false,
            filterable: false,
            listable: false,
            not_mapped: false,
            required: false,
            range_partner: None,
            joined: None,
            aggregate: None,
        }
    }

    pub fn column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn listable(mut self) -> Self {
        self.listable = true;
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Pair this column with `partner`, a not-mapped property holding the
    /// upper bound. The column's own value is the lower bound.
    pub fn range_to(mut self, partner: &'static str) -> Self {
        self.range_partner = Some(partner);
        self
    }

    pub fn joined(mut self, relational: RelationalColumn) -> Self {
        self.joined = Some(relational);
        self
    }

    pub fn aggregate(mut self, kind: AggregateKind, column: &'static str) -> Self {
        self.aggregate = Some(Aggregate { kind, column });
        self
    }

    /// True for columns backed by the entity's own table.
    pub fn is_physical(&self) -> bool {
        !self.not_mapped && self.joined.is_none() && self.aggregate.is_none()
    }

    /// Whether SELECT needs an alias to map this column back to its property.
    pub fn is_aliased(&self) -> bool {
        self.property != self.column
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// A declared relation from one model to another.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    /// Property of the owning model that holds the related instance(s).
    pub property: &'static str,
    pub cardinality: Cardinality,
    pub target: EntityFactory,
    /// Foreign-key property: on the target for OneToOne/OneToMany, on the
    /// owner for ManyToOne, on the intermediary (pointing at the owner) for
    /// ManyToMany.
    pub foreign_key_attribute: &'static str,
    pub intermediary: Option<EntityFactory>,
    /// Property of the intermediary pointing at the target.
    pub intermediary_key_attribute: Option<&'static str>,
}

impl RelationDescriptor {
    pub fn new(
        property: &'static str,
        cardinality: Cardinality,
        target: EntityFactory,
        foreign_key_attribute: &'static str,
    ) -> Self {
        Self {
            property,
            cardinality,
            target,
            foreign_key_attribute,
            intermediary: None,
            intermediary_key_attribute: None,
        }
    }

    pub fn one_to_one(property: &'static str, target: EntityFactory, foreign_key: &'static str) -> Self {
        Self::new(property, Cardinality::OneToOne, target, foreign_key)
    }

    pub fn many_to_one(property: &'static str, target: EntityFactory, foreign_key: &'static str) -> Self {
        Self::new(property, Cardinality::ManyToOne, target, foreign_key)
    }

    pub fn one_to_many(property: &'static str, target: EntityFactory, foreign_key: &'static str) -> Self {
        Self::new(property, Cardinality::OneToMany, target, foreign_key)
    }

    pub fn many_to_many(
        property: &'static str,
        target: EntityFactory,
        intermediary: EntityFactory,
        this_side: &'static str,
        other_side: &'static str,
    ) -> Self {
        Self::new(property, Cardinality::ManyToMany, target, this_side).through(intermediary, other_side)
    }

    pub fn through(mut self, intermediary: EntityFactory, other_side: &'static str) -> Self {
        self.intermediary = Some(intermediary);
        self.intermediary_key_attribute = Some(other_side);
        self
    }

    /// The intermediary factory and its "other side" attribute.
    ///
    /// Fails with a configuration error for many-to-many relations declared
    /// without a join entity.
    pub fn intermediary(&self) -> Result<(EntityFactory, &'static str), DataError> {
        match (self.intermediary, self.intermediary_key_attribute) {
            (Some(factory), Some(attr)) => Ok((factory, attr)),
            _ => Err(DataError::configuration(format!(
                "many-to-many relation '{}' has no intermediary entity",
                self.property
            ))),
        }
    }
}

/// Immutable mapping metadata of one model type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    type_name: &'static str,
    table: TableBinding,
    columns: Vec<ColumnDescriptor>,
    key_index: usize,
    foreign_key_index: Option<usize>,
    relations: Vec<RelationDescriptor>,
    cacheable: bool,
}

impl EntityDescriptor {
    pub fn builder() -> EntityDescriptorBuilder {
        EntityDescriptorBuilder::default()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn with_type_name(mut self, type_name: &'static str) -> Self {
        self.type_name = type_name;
        self
    }

    pub fn table(&self) -> &TableBinding {
        &self.table
    }

    pub fn table_name(&self) -> String {
        self.table.qualified()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn key_column(&self) -> &ColumnDescriptor {
        &self.columns[self.key_index]
    }

    pub fn foreign_key_column(&self) -> Option<&ColumnDescriptor> {
        self.foreign_key_index.map(|i| &self.columns[i])
    }

    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn column(&self, property: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.property == property)
    }

    pub fn filterable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.filterable)
    }

    pub fn listable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.listable)
    }
}

/// Builder for [`EntityDescriptor`]; `build()` validates the declaration.
#[derive(Debug, Default)]
pub struct EntityDescriptorBuilder {
    schema: Option<&'static str>,
    table: Option<&'static str>,
    columns: Vec<ColumnDescriptor>,
    relations: Vec<RelationDescriptor>,
    cacheable: bool,
}

impl EntityDescriptorBuilder {
    pub fn table(mut self, name: &'static str) -> Self {
        self.table = Some(name);
        self
    }

    pub fn schema(mut self, schema: &'static str) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    pub fn build(self) -> Result<EntityDescriptor, DataError> {
        let name = match self.table {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(DataError::configuration(
                    "entity table binding not found, review the model definition",
                ))
            }
        };

        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.property == col.property) {
                return Err(DataError::configuration(format!(
                    "property '{}' is mapped twice on table '{name}'",
                    col.property
                )));
            }
        }

        let mut keys = self.columns.iter().enumerate().filter(|(_, c)| c.key);
        let key_index = match (keys.next(), keys.next()) {
            (Some((i, _)), None) => i,
            (None, _) => {
                return Err(DataError::configuration(format!(
                    "entity key column not found on table '{name}', review the model definition"
                )))
            }
            (Some(_), Some(_)) => {
                return Err(DataError::configuration(format!(
                    "table '{name}' declares more than one key column"
                )))
            }
        };
        let foreign_key_index = self.columns.iter().position(|c| c.foreign_key);

        Ok(EntityDescriptor {
            type_name: name,
            table: TableBinding {
                schema: self.schema,
                name,
            },
            columns: self.columns,
            key_index,
            foreign_key_index,
            relations: self.relations,
            cacheable: self.cacheable,
        })
    }
}
