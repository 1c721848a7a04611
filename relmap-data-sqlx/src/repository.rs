use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use relmap_cache::ResultCache;
use relmap_core::MapperConfig;
use relmap_data::{
    compose_statement, describe, filter_by_filterable, filter_by_key, key_value,
    load_composition, parse_composition, ComposeOptions, DataError, Entity, EntityDescriptor,
    ExecOutcome, Executor, PersistenceAction, Row, Statement, Transaction, Value,
};

use crate::replica::ReplicaSet;
use crate::tx::Tx;

/// Per-call read options layered over the repository's compose defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum number of rows; `0` means unlimited.
    pub limit: usize,
    pub order_by: Vec<String>,
    pub descending: bool,
    pub group_by: Vec<String>,
    pub only_listable: bool,
    pub show: Vec<String>,
    /// AND the filter terms instead of OR-ing them.
    pub conjunction: bool,
    /// Eager-load relations of every result.
    pub load: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn order_by(mut self, attributes: &[&str], descending: bool) -> Self {
        self.order_by = attributes.iter().map(|a| a.to_string()).collect();
        self.descending = descending;
        self
    }

    pub fn group_by(mut self, attributes: &[&str]) -> Self {
        self.group_by = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn only_listable(mut self, show: &[&str]) -> Self {
        self.only_listable = true;
        self.show = show.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn conjunction(mut self, conjunction: bool) -> Self {
        self.conjunction = conjunction;
        self
    }

    pub fn load(mut self, load: bool) -> Self {
        self.load = load;
        self
    }

    /// Whether the result depends on the filter alone, so it can be cached
    /// under the filter's key.
    fn is_cacheable_shape(&self) -> bool {
        let plain = QueryOptions {
            load: self.load,
            ..QueryOptions::default()
        };
        *self == plain
    }

    fn apply(&self, base: &ComposeOptions) -> ComposeOptions {
        ComposeOptions {
            limit: self.limit,
            conjunction: self.conjunction,
            only_listable: self.only_listable,
            show_attributes: self.show.clone(),
            group_attributes: self.group_by.clone(),
            order_attributes: self.order_by.clone(),
            order_descending: self.descending,
            ..base.clone()
        }
    }
}

/// CRUD, search and cascading writes for one model type.
///
/// Reads of cacheable models go through the result cache when it is enabled;
/// every write drops the cached results of `T`. Successful primary writes are
/// queued for the replicas, if any.
///
/// # Example
///
/// ```ignore
/// let executor: Arc<dyn Executor> = Arc::new(SqliteExecutor::connect("sqlite://app.db").await?);
/// let repo = Repository::<Sample>::new(executor, &config);
/// let id = repo.add(&mut sample, true).await?;
/// let found = repo.get(id, true).await?;
/// ```
pub struct Repository<T: Entity> {
    executor: Arc<dyn Executor>,
    options: ComposeOptions,
    cache: Option<Arc<ResultCache>>,
    replicas: Option<Arc<ReplicaSet>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            options: self.options.clone(),
            cache: self.cache.clone(),
            replicas: self.replicas.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    /// Repository on `executor`, using the process-wide cache when the
    /// configuration enables it.
    pub fn new(executor: Arc<dyn Executor>, config: &MapperConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| relmap_cache::init_global(config.cache.memory_limit_mb));
        Self {
            executor,
            options: config.compose_options(),
            cache,
            replicas: None,
            _marker: PhantomData,
        }
    }

    /// Replace the cache; `None` disables caching.
    pub fn with_cache(mut self, cache: Option<Arc<ResultCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_replicas(mut self, replicas: Arc<ReplicaSet>) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    fn cache_for(&self, descriptor: &EntityDescriptor) -> Option<&ResultCache> {
        self.cache
            .as_deref()
            .filter(|_| descriptor.is_cacheable())
    }

    /// Find by key.
    pub async fn get(&self, key: impl Into<Value>, load: bool) -> Result<Option<T>, DataError> {
        let filter = filter_by_key::<T>(key)?;
        self.get_by(&filter, load).await
    }

    /// First row matching `filter` with AND-joined terms.
    ///
    /// Only key lookups use the cache: a Query under the same filter returns
    /// the same single row, while other Get filters would not.
    pub async fn get_by(&self, filter: &T, load: bool) -> Result<Option<T>, DataError> {
        let descriptor = describe::<T>()?;
        let cache = self
            .cache_for(&descriptor)
            .filter(|_| is_key_only(filter, &descriptor));

        let cached = cache.and_then(|c| c.get(filter));
        let mut found = match cached {
            Some(values) => {
                tracing::trace!(entity = descriptor.type_name(), "get served from cache");
                values.into_iter().next()
            }
            None => {
                let generation = cache.map(|c| c.generation::<T>());
                let statement =
                    compose_statement(PersistenceAction::Get, None, Some(filter), &self.options)?;
                let rows = self.executor.fetch_rows(&descriptor, &statement).await?;
                let found = rows.first().map(|row| hydrate::<T>(&descriptor, row));
                if let (Some(cache), Some(generation), Some(item)) = (cache, generation, &found) {
                    cache.put_if_unchanged(filter, vec![item.clone()], generation);
                }
                found
            }
        };

        if load {
            if let Some(item) = found.as_mut() {
                load_composition(self.executor(), item, &self.options).await?;
            }
        }
        Ok(found)
    }

    /// Rows matching `filter`: text terms match partially and terms are
    /// OR-joined unless `options.conjunction`.
    pub async fn query(&self, filter: &T, options: &QueryOptions) -> Result<Vec<T>, DataError> {
        let descriptor = describe::<T>()?;
        let cache = self
            .cache_for(&descriptor)
            .filter(|_| options.is_cacheable_shape());

        let mut items = match cache.and_then(|c| c.get(filter)) {
            Some(values) => values,
            None => {
                let generation = cache.map(|c| c.generation::<T>());
                let compose_options = options.apply(&self.options);
                let statement = compose_statement(
                    PersistenceAction::Query,
                    None,
                    Some(filter),
                    &compose_options,
                )?;
                let rows = self.executor.fetch_rows(&descriptor, &statement).await?;
                let items: Vec<T> = rows.iter().map(|row| hydrate::<T>(&descriptor, row)).collect();
                if let (Some(cache), Some(generation)) = (cache, generation) {
                    cache.put_if_unchanged(filter, items.clone(), generation);
                }
                items
            }
        };

        if options.load {
            for item in &mut items {
                load_composition(self.executor(), item, &self.options).await?;
            }
        }
        Ok(items)
    }

    /// Free-text search: `criteria` is matched against every filterable column.
    pub async fn search(&self, criteria: &str, options: &QueryOptions) -> Result<Vec<T>, DataError> {
        let filter = filter_by_filterable::<T>(criteria)?;
        self.query(&filter, options).await
    }

    /// Number of rows matching `filter`.
    pub async fn count(&self, filter: &T) -> Result<i64, DataError> {
        let statement =
            compose_statement(PersistenceAction::Count, None, Some(filter), &self.options)?;
        self.executor.fetch_scalar(&statement).await
    }

    /// Insert `entity`, cascading into its relations when `persist`.
    ///
    /// Returns the generated key, which is also written back into `entity`.
    pub async fn add(&self, entity: &mut T, persist: bool) -> Result<i64, DataError> {
        let ids = self.add_range(std::slice::from_mut(entity), persist).await?;
        Ok(ids.into_iter().next().unwrap_or(0))
    }

    /// Insert every entity in one transaction; any failure rolls all back.
    pub async fn add_range(&self, entities: &mut [T], persist: bool) -> Result<Vec<i64>, DataError> {
        let descriptor = describe::<T>()?;
        let tx = Tx::begin(self.executor()).await?;
        let recorder = Recorder::new(&tx);

        let mut ids = Vec::with_capacity(entities.len());
        let result = async {
            for entity in entities.iter_mut() {
                ids.push(self.insert_one(&recorder, &descriptor, entity, persist).await?);
            }
            Ok::<_, DataError>(())
        }
        .await;
        let statements = recorder.into_statements();

        if let Err(err) = result {
            return Err(self.abort(tx, err).await);
        }
        self.commit_write(tx, touched_types(&descriptor, persist), statements)
            .await?;
        tracing::debug!(entity = descriptor.type_name(), count = ids.len(), "added entities");
        Ok(ids)
    }

    async fn insert_one(
        &self,
        executor: &Recorder<'_>,
        descriptor: &EntityDescriptor,
        entity: &mut T,
        persist: bool,
    ) -> Result<i64, DataError> {
        let statement = compose_statement(PersistenceAction::Add, Some(&*entity), None, &self.options)?;
        let outcome = executor.execute(&statement).await?;
        let key = descriptor.key_column();
        let id = match outcome.last_insert_id {
            Some(id) => id,
            None => key_value(&*entity, descriptor).as_i64().unwrap_or(0),
        };
        if key_value(&*entity, descriptor).is_unset() {
            entity.set(key.property, Value::Long(id).coerce(key.value_type));
        }

        if persist && !descriptor.relations().is_empty() {
            self.cascade(executor, entity, PersistenceAction::Add, None)
                .await
                .map_err(DataError::composition)?;
        }
        Ok(id)
    }

    /// Update rows matching `filter` with the set fields of `entity`.
    pub async fn update(&self, entity: &mut T, filter: &T, persist: bool) -> Result<u64, DataError> {
        let descriptor = describe::<T>()?;
        let tx = Tx::begin(self.executor()).await?;
        let recorder = Recorder::new(&tx);

        let result = async {
            let statement = compose_statement(
                PersistenceAction::Update,
                Some(&*entity),
                Some(filter),
                &self.options,
            )?;
            let outcome = recorder.execute(&statement).await?;
            if persist && !descriptor.relations().is_empty() {
                self.cascade(&recorder, entity, PersistenceAction::Update, Some(filter))
                    .await
                    .map_err(DataError::composition)?;
            }
            Ok::<_, DataError>(outcome.rows_affected)
        }
        .await;
        let statements = recorder.into_statements();

        match result {
            Ok(rows) => {
                self.commit_write(tx, touched_types(&descriptor, persist), statements)
                    .await?;
                Ok(rows)
            }
            Err(err) => Err(self.abort(tx, err).await),
        }
    }

    /// Write the relations of `entity` after its own statement ran.
    async fn cascade(
        &self,
        executor: &Recorder<'_>,
        entity: &mut T,
        action: PersistenceAction,
        filter: Option<&T>,
    ) -> Result<(), DataError> {
        let composition = parse_composition(
            executor,
            entity,
            action,
            filter.map(|f| f as &dyn relmap_data::AnyEntity),
            &self.options,
        )
        .await?;
        for child in &composition.statements {
            executor.execute(child).await?;
        }
        Ok(())
    }

    /// Delete rows matching `filter`. Relations are not cascaded.
    pub async fn remove(&self, filter: &T) -> Result<u64, DataError> {
        let descriptor = describe::<T>()?;
        let statement =
            compose_statement(PersistenceAction::Remove, None, Some(filter), &self.options)?;
        let outcome = self.executor.execute(&statement).await?;
        self.after_write(&touched_types(&descriptor, false), vec![statement])
            .await;
        Ok(outcome.rows_affected)
    }

    /// Run [`search`](Self::search) for every criteria concurrently and count
    /// how many searches returned each row, most frequent first.
    pub async fn bulk_search(
        &self,
        criteria: &[&str],
        options: &QueryOptions,
    ) -> Result<Vec<(T, usize)>, DataError> {
        let descriptor = describe::<T>()?;
        let merged: DashMap<String, (T, usize)> = DashMap::new();
        let searches = criteria.iter().map(|text| {
            let merged = &merged;
            let descriptor = &descriptor;
            async move {
                for item in self.search(text, options).await? {
                    let key = format!("{:?}", key_value(&item, descriptor));
                    merged
                        .entry(key)
                        .and_modify(|(_, hits)| *hits += 1)
                        .or_insert((item, 1));
                }
                Ok::<_, DataError>(())
            }
        });
        for result in join_all(searches).await {
            result?;
        }

        let mut ranked: Vec<(String, (T, usize))> = merged.into_iter().collect();
        ranked.sort_by(|(ka, (_, a)), (kb, (_, b))| b.cmp(a).then_with(|| ka.cmp(kb)));
        Ok(ranked.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn commit_write(
        &self,
        tx: Tx<'_>,
        touched: Vec<&'static str>,
        statements: Vec<Statement>,
    ) -> Result<(), DataError> {
        tx.commit().await?;
        self.after_write(&touched, statements).await;
        Ok(())
    }

    /// Roll back, then hand the cause back unchanged.
    async fn abort(&self, tx: Tx<'_>, err: DataError) -> DataError {
        if let Err(rollback) = tx.rollback().await {
            tracing::error!(error = %rollback, "rollback failed");
        }
        tracing::warn!(entity = std::any::type_name::<T>(), error = %err, "write rolled back");
        err
    }

    async fn after_write(&self, touched: &[&'static str], statements: Vec<Statement>) {
        if let Some(cache) = &self.cache {
            for type_name in touched {
                cache.invalidate_type_named(type_name);
            }
        }
        if let Some(replicas) = &self.replicas {
            replicas.replicate(statements).await;
        }
    }
}

/// Types whose cached results a write of `descriptor` can change: the model
/// itself, plus its relation targets and link types when relations are
/// persisted.
fn touched_types(descriptor: &EntityDescriptor, persist: bool) -> Vec<&'static str> {
    let mut types = vec![descriptor.type_name()];
    if persist {
        for relation in descriptor.relations() {
            types.push((relation.target)().type_name());
            if let Some(intermediary) = relation.intermediary {
                types.push(intermediary().type_name());
            }
        }
    }
    types
}

fn is_key_only<T: Entity>(filter: &T, descriptor: &EntityDescriptor) -> bool {
    let unset = |property| filter.get(property).map_or(true, |v| v.is_unset());
    let key = descriptor.key_column();
    !unset(key.property)
        && descriptor
            .columns()
            .iter()
            .filter(|c| !c.key)
            .all(|c| unset(c.property))
}

fn hydrate<T: Entity>(descriptor: &EntityDescriptor, row: &Row) -> T {
    let mut item = T::default();
    row.apply(descriptor, &mut item);
    item
}

/// Forwards to the open transaction and keeps every write it ran, so the
/// replicas receive exactly what the primary applied.
struct Recorder<'a> {
    inner: &'a dyn Executor,
    writes: Mutex<Vec<Statement>>,
}

impl<'a> Recorder<'a> {
    fn new(inner: &'a dyn Executor) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
        }
    }

    fn into_statements(self) -> Vec<Statement> {
        self.writes.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Executor for Recorder<'_> {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        let outcome = self.inner.execute(statement).await?;
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(statement.clone());
        }
        Ok(outcome)
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        self.inner.fetch_scalar(statement).await
    }

    async fn fetch_rows(
        &self,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        self.inner.fetch_rows(descriptor, statement).await
    }

    async fn begin<'b>(&'b self) -> Result<Box<dyn Transaction + 'b>, DataError> {
        self.inner.begin().await
    }
}
