//! Relation resolution: eager loading and cascading persistence, one level deep.

use crate::compose::compose;
use crate::descriptor::{Cardinality, EntityDescriptor, RelationDescriptor};
use crate::entity::{key_value, AnyEntity, EntityFactory, Fields, Related};
use crate::error::DataError;
use crate::executor::Executor;
use crate::options::{ComposeOptions, PersistenceAction};
use crate::statement::Statement;
use crate::value::Value;

/// Child statements of a cascading write, plus the filter instance used for
/// each child (or a wired placeholder for an empty relation).
#[derive(Debug, Default)]
pub struct Composition {
    pub statements: Vec<Statement>,
    pub filters: Vec<Box<dyn AnyEntity>>,
}

impl Composition {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn push(&mut self, statement: Statement, filter: Box<dyn AnyEntity>) {
        self.statements.push(statement);
        self.filters.push(filter);
    }
}

/// Populate every declared relation of `instance` from the database.
///
/// Relations whose anchoring key is still at its zero sentinel are left
/// untouched.
pub async fn load_composition(
    executor: &dyn Executor,
    instance: &mut dyn AnyEntity,
    options: &ComposeOptions,
) -> Result<(), DataError> {
    let descriptor = instance.descriptor()?;
    let parent_key = key_value(instance, &descriptor);
    let lookup = options.plain();

    for relation in descriptor.relations() {
        let related = match relation.cardinality {
            Cardinality::OneToOne => {
                if parent_key.is_unset() {
                    continue;
                }
                let target = Target::of(relation.target)?;
                let mut filter = target.blank();
                target.assign(filter.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                target
                    .fetch(executor, PersistenceAction::Get, filter.as_ref(), &lookup)
                    .await?
                    .into_iter()
                    .next()
                    .map(Related::One)
            }
            Cardinality::ManyToOne => {
                let foreign = instance
                    .get(relation.foreign_key_attribute)
                    .unwrap_or(Value::Null);
                if foreign.is_unset() {
                    continue;
                }
                let target = Target::of(relation.target)?;
                let mut filter = target.blank();
                target.assign_key(filter.as_mut(), foreign);
                target
                    .fetch(executor, PersistenceAction::Get, filter.as_ref(), &lookup)
                    .await?
                    .into_iter()
                    .next()
                    .map(Related::One)
            }
            Cardinality::OneToMany => {
                if parent_key.is_unset() {
                    continue;
                }
                let target = Target::of(relation.target)?;
                let mut filter = target.blank();
                target.assign(filter.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                let children = target
                    .fetch(
                        executor,
                        PersistenceAction::Query,
                        filter.as_ref(),
                        &lookup.clone().conjunction(true),
                    )
                    .await?;
                Some(Related::Many(children))
            }
            Cardinality::ManyToMany => {
                let (link_factory, other_side) = relation.intermediary()?;
                if parent_key.is_unset() {
                    continue;
                }
                let link = Target::of(link_factory)?;
                let target = Target::of(relation.target)?;
                let mut filter = link.blank();
                link.assign(filter.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                let links = link
                    .fetch(
                        executor,
                        PersistenceAction::Query,
                        filter.as_ref(),
                        &lookup.clone().conjunction(true),
                    )
                    .await?;

                let mut items = Vec::with_capacity(links.len());
                for row in &links {
                    let other = row.get(other_side).unwrap_or(Value::Null);
                    if other.is_unset() {
                        continue;
                    }
                    let mut by_key = target.blank();
                    target.assign_key(by_key.as_mut(), other);
                    if let Some(item) = target
                        .fetch(executor, PersistenceAction::Get, by_key.as_ref(), &lookup)
                        .await?
                        .into_iter()
                        .next()
                    {
                        items.push(item);
                    }
                }
                Some(Related::Many(items))
            }
        };

        if let Some(related) = related {
            tracing::debug!(
                entity = descriptor.type_name(),
                relation = relation.property,
                "loaded relation"
            );
            instance.assign_related(relation.property, related);
        }
    }
    Ok(())
}

/// Build the child statements of a cascading Add or Update of `payload`.
///
/// New many-to-one and many-to-many targets are inserted through `executor`
/// right away, since their generated keys must be wired into the parent or
/// the link row before the remaining statements can be composed. Generated
/// keys and wired foreign keys are written back into `payload`'s relations.
pub async fn parse_composition(
    executor: &dyn Executor,
    payload: &mut dyn AnyEntity,
    action: PersistenceAction,
    filter: Option<&dyn AnyEntity>,
    options: &ComposeOptions,
) -> Result<Composition, DataError> {
    let descriptor = payload.descriptor()?;
    let mut parent_key = key_value(payload, &descriptor);
    if parent_key.is_unset() && action == PersistenceAction::Update {
        if let Some(filter) = filter {
            parent_key = key_value(filter, &descriptor);
        }
    }

    let options = options.plain();
    let mut composition = Composition::default();
    for relation in descriptor.relations() {
        let Some(related) = payload.related(relation.property) else {
            continue;
        };
        let written = match relation.cardinality {
            Cardinality::OneToOne => {
                let Some(mut child) = first(related) else {
                    continue;
                };
                let target = Target::of(relation.target)?;
                target.assign(child.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                target.persist(child.as_mut(), &options, &mut composition)?;
                Related::One(child)
            }
            Cardinality::ManyToOne => {
                let Some(mut child) = first(related) else {
                    continue;
                };
                let target = Target::of(relation.target)?;
                let mut child_key = key_value(child.as_ref(), &target.descriptor);
                if child_key.is_unset() {
                    let id = target.insert(executor, child.as_ref(), &options).await?;
                    target.assign_key(child.as_mut(), Value::Long(id));
                    child_key = key_value(child.as_ref(), &target.descriptor);
                } else {
                    target.persist(child.as_mut(), &options, &mut composition)?;
                }
                assign_coerced(payload, &descriptor, relation.foreign_key_attribute, child_key.clone());
                if !parent_key.is_unset() {
                    composition.statements.push(patch_foreign_key(
                        &descriptor,
                        relation,
                        parent_key.clone(),
                        child_key,
                        &options,
                    )?);
                    composition.filters.push(payload.clone_entity());
                }
                Related::One(child)
            }
            Cardinality::OneToMany => {
                let target = Target::of(relation.target)?;
                let mut children = many(related);
                if children.is_empty() {
                    let mut placeholder = target.blank();
                    target.assign(placeholder.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                    composition.filters.push(placeholder);
                }
                for child in children.iter_mut() {
                    target.assign(child.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                    target.persist(child.as_mut(), &options, &mut composition)?;
                }
                Related::Many(children)
            }
            Cardinality::ManyToMany => {
                let (link_factory, other_side) = relation.intermediary()?;
                let link = Target::of(link_factory)?;
                let target = Target::of(relation.target)?;
                let mut items = many(related);
                if items.is_empty() {
                    let mut placeholder = link.blank();
                    link.assign(placeholder.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                    composition.filters.push(placeholder);
                }
                for item in items.iter_mut() {
                    let item_key = target.resolve_key(executor, item.as_mut(), &options).await?;

                    let mut row = link.blank();
                    link.assign(row.as_mut(), relation.foreign_key_attribute, parent_key.clone());
                    link.assign(row.as_mut(), other_side, item_key);
                    match link
                        .fetch(executor, PersistenceAction::Get, row.as_ref(), &options)
                        .await?
                        .into_iter()
                        .next()
                    {
                        Some(existing) => {
                            let mut by_key = link.blank();
                            link.assign_key(by_key.as_mut(), key_value(existing.as_ref(), &link.descriptor));
                            let statement = compose(
                                &link.descriptor,
                                PersistenceAction::Update,
                                Some(row.as_fields()),
                                Some(by_key.as_fields()),
                                &options,
                            )?;
                            composition.push(statement, by_key);
                        }
                        None => {
                            let statement = compose(
                                &link.descriptor,
                                PersistenceAction::Add,
                                Some(row.as_fields()),
                                None,
                                &options,
                            )?;
                            composition.push(statement, row);
                        }
                    }
                }
                Related::Many(items)
            }
        };
        payload.assign_related(relation.property, written);
    }

    if composition.statements.iter().any(Statement::is_insert) {
        composition.statements.reverse();
    }
    tracing::debug!(
        entity = descriptor.type_name(),
        statements = composition.statements.len(),
        "parsed composition"
    );
    Ok(composition)
}

fn first(related: Related) -> Option<Box<dyn AnyEntity>> {
    match related {
        Related::One(item) => Some(item),
        Related::Many(items) => items.into_iter().next(),
    }
}

fn many(related: Related) -> Vec<Box<dyn AnyEntity>> {
    match related {
        Related::One(item) => vec![item],
        Related::Many(items) => items,
    }
}

/// Set `property`, converting `value` to the column's declared type.
fn assign_coerced(entity: &mut dyn AnyEntity, descriptor: &EntityDescriptor, property: &str, value: Value) {
    let value = match descriptor.column(property) {
        Some(column) => value.coerce(column.value_type),
        None => value,
    };
    entity.set(property, value);
}

/// Property values addressed by name, used for partial statements.
struct Patch(Vec<(&'static str, Value)>);

impl Fields for Patch {
    fn get(&self, property: &str) -> Option<Value> {
        self.0
            .iter()
            .find(|(name, _)| *name == property)
            .map(|(_, value)| value.clone())
    }

    fn set(&mut self, _property: &str, _value: Value) {}
}

/// `UPDATE parent SET fk = child_key WHERE parent.key = parent_key`.
fn patch_foreign_key(
    descriptor: &EntityDescriptor,
    relation: &RelationDescriptor,
    parent_key: Value,
    child_key: Value,
    options: &ComposeOptions,
) -> Result<Statement, DataError> {
    let key = descriptor.key_column();
    let fk_type = descriptor
        .column(relation.foreign_key_attribute)
        .map(|c| c.value_type)
        .ok_or_else(|| {
            DataError::configuration(format!(
                "relation '{}' names unmapped foreign key '{}'",
                relation.property, relation.foreign_key_attribute
            ))
        })?;
    let assignment = Patch(vec![(relation.foreign_key_attribute, child_key.coerce(fk_type))]);
    let filter = Patch(vec![(key.property, parent_key.coerce(key.value_type))]);
    compose(
        descriptor,
        PersistenceAction::Update,
        Some(&assignment),
        Some(&filter),
        options,
    )
}

/// A relation target (or intermediary) with its resolved descriptor.
struct Target {
    factory: EntityFactory,
    descriptor: std::sync::Arc<EntityDescriptor>,
}

impl Target {
    fn of(factory: EntityFactory) -> Result<Self, DataError> {
        let descriptor = factory().descriptor()?;
        Ok(Self { factory, descriptor })
    }

    fn blank(&self) -> Box<dyn AnyEntity> {
        (self.factory)()
    }

    fn assign(&self, entity: &mut dyn AnyEntity, property: &str, value: Value) {
        assign_coerced(entity, &self.descriptor, property, value);
    }

    fn assign_key(&self, entity: &mut dyn AnyEntity, value: Value) {
        self.assign(entity, self.descriptor.key_column().property, value);
    }

    async fn fetch(
        &self,
        executor: &dyn Executor,
        action: PersistenceAction,
        filter: &dyn AnyEntity,
        options: &ComposeOptions,
    ) -> Result<Vec<Box<dyn AnyEntity>>, DataError> {
        let statement = compose(&self.descriptor, action, None, Some(filter.as_fields()), options)?;
        let rows = executor.fetch_rows(&self.descriptor, &statement).await?;
        Ok(rows
            .iter()
            .map(|row| row.hydrate(&self.descriptor, self.factory))
            .collect())
    }

    /// Insert `entity` immediately and return its generated key.
    async fn insert(
        &self,
        executor: &dyn Executor,
        entity: &dyn AnyEntity,
        options: &ComposeOptions,
    ) -> Result<i64, DataError> {
        let statement = compose(
            &self.descriptor,
            PersistenceAction::Add,
            Some(entity.as_fields()),
            None,
            options,
        )?;
        let outcome = executor.execute(&statement).await?;
        outcome.last_insert_id.ok_or_else(|| {
            DataError::Other(format!(
                "insert into '{}' reported no generated key",
                self.descriptor.table_name()
            ))
        })
    }

    /// Key of a many-to-many target: its own, an existing equal row's, or a
    /// freshly inserted one.
    async fn resolve_key(
        &self,
        executor: &dyn Executor,
        entity: &mut dyn AnyEntity,
        options: &ComposeOptions,
    ) -> Result<Value, DataError> {
        let own = key_value(entity, &self.descriptor);
        if !own.is_unset() {
            return Ok(own);
        }
        let found = self
            .fetch(executor, PersistenceAction::Get, entity, options)
            .await?
            .into_iter()
            .next()
            .map(|existing| key_value(existing.as_ref(), &self.descriptor));
        let key = match found {
            Some(key) if !key.is_unset() => key,
            _ => Value::Long(self.insert(executor, entity, options).await?),
        };
        self.assign_key(entity, key.clone());
        Ok(key_value(entity, &self.descriptor))
    }

    /// Add when the key is unset; otherwise Update with the key migrated to a
    /// filter instance and zeroed in the payload.
    fn persist(
        &self,
        child: &mut dyn AnyEntity,
        options: &ComposeOptions,
        composition: &mut Composition,
    ) -> Result<(), DataError> {
        let key_column = self.descriptor.key_column();
        let key = key_value(child, &self.descriptor);
        if key.is_unset() {
            let statement = compose(
                &self.descriptor,
                PersistenceAction::Add,
                Some(child.as_fields()),
                None,
                options,
            )?;
            composition.push(statement, child.clone_entity());
            return Ok(());
        }

        let mut filter = self.blank();
        self.assign_key(filter.as_mut(), key.clone());
        child.set(key_column.property, key_column.value_type.zero());
        let statement = compose(
            &self.descriptor,
            PersistenceAction::Update,
            Some(child.as_fields()),
            Some(filter.as_fields()),
            options,
        )?;
        composition.push(statement, filter);
        Ok(())
    }
}
